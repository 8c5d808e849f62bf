//! Application services and the adapter traits they depend on.

pub mod admin;
pub mod articles;
pub mod auth;
pub mod error;
pub mod pagination;
pub mod repos;
