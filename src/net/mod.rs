//! Network layer.
//!
//! # Data Flow
//! ```text
//! listen address (host:port | :port)
//!     → listener.rs (normalize, bind)
//!     → TcpListener handed to the lifecycle controller
//! ```

pub mod listener;

pub use listener::{bind, normalize_address};
