pub mod links;
pub mod timezone;
