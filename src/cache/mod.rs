//! Key/value cache with per-entry TTL.
//!
//! `CacheStore` is the seam the group repository reads through; `MokaStore`
//! is the in-process implementation used in production and in tests.

pub mod keys;
mod store;

pub use keys::group_key;
pub use store::{CacheStore, MokaStore};
