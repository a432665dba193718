//! Domain layer types and invariants.

pub mod context;
pub mod entities;
pub mod error;
pub mod resolve;
pub mod slug;
pub mod types;
