//! Middleware applied to the API group.

pub mod token;

pub use token::{audience_from_path, require_token, API_PREFIX};
