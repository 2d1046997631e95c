//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (owned by lifecycle::ServerProcess)
//!     → server.rs (Axum router, service-level middleware)
//!     → middleware/ (token validation for the API group)
//!     → caller-supplied handlers
//!     → response.rs (status mapping, JSON rendering)
//! ```

pub mod middleware;
pub mod response;
pub mod server;

pub use response::{render, ApiError, Validate, ValidatedJson};
pub use server::{build_router, AppState};
