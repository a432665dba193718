//! Cache key definitions.

/// Key under which a loaded group is cached: `{prefix}:{slug}`.
///
/// Always computed from the owning group's slug, never from a bit's context name.
pub fn group_key(prefix: &str, slug: &str) -> String {
    format!("{prefix}:{slug}")
}
