//! Derivation and validation of group slugs and bit context names.
//!
//! Group slugs are URL-style (`site-header`). Context names are template
//! identifiers (`site_header`) since they become variable names in the page
//! template context. Both are derived from the human-readable name only when
//! the caller leaves them blank on first save; Chinese input is transliterated
//! through `pinyin` before `slug` normalisation.

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

const MAX_LENGTH: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("`{value}` is not a valid {kind}: {reason}")]
    Invalid {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Derive a URL-style slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let mut candidate = slugify(&transliterated);
    candidate.truncate(MAX_LENGTH);
    let candidate = candidate.trim_end_matches('-').to_string();

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Derive a template identifier from the provided human-readable text.
pub fn derive_context_name(input: &str) -> Result<String, SlugError> {
    let slug = derive_slug(input)?;
    let mut name = slug.replace('-', "_");
    if name.starts_with(|ch: char| ch.is_ascii_digit()) {
        name.insert(0, '_');
    }
    Ok(name)
}

pub fn validate_slug(value: &str) -> Result<(), SlugError> {
    let invalid = |reason| SlugError::Invalid {
        kind: "slug",
        value: value.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_LENGTH {
        return Err(invalid("too long"));
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        return Err(invalid(
            "only lowercase letters, digits, `-` and `_` are allowed",
        ));
    }
    Ok(())
}

pub fn validate_context_name(value: &str) -> Result<(), SlugError> {
    let invalid = |reason| SlugError::Invalid {
        kind: "context name",
        value: value.to_string(),
        reason,
    };

    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("must not be empty"));
    };
    if value.len() > MAX_LENGTH {
        return Err(invalid("too long"));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or `_`"));
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(invalid("only letters, digits and `_` are allowed"));
    }
    Ok(())
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}
