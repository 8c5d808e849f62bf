//! Domain layer types and invariants.

pub mod archive;
pub mod articles;
pub mod entities;
pub mod error;
pub mod session;
pub mod types;
