//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! API request:
//!     → http::middleware::token (bearer token → Claims)
//!     → handler
//!     → authorization.rs (permission check by claims, action, object)
//! ```
//!
//! # Design Decisions
//! - Fail closed: missing or unknown tokens are rejected
//! - No trust in client input

pub mod authorization;

pub use authorization::{Action, AuthError, Authorization, Claims, StaticTokenAuth};
