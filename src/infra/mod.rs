//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod session_store;
pub mod supabase;
pub mod telemetry;
