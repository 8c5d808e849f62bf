//! Blog archive aggregation, article retrieval and admin session flow
//! backed by a hosted Supabase project.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
