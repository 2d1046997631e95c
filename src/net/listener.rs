//! TCP listener binding.
//!
//! # Responsibilities
//! - Accept `host:port` and `:port` address forms
//! - Bind the listening socket before any traffic is served

use tokio::net::TcpListener;

/// Expand `:port` to `0.0.0.0:port`; other forms are returned unchanged.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => address.to_string(),
    }
}

/// Bind a listener on `address`.
pub async fn bind(address: &str) -> Result<TcpListener, std::io::Error> {
    let address = normalize_address(address);
    let listener = TcpListener::bind(&address).await?;

    tracing::info!(
        address = %listener.local_addr()?,
        "Listener bound"
    );

    Ok(listener)
}
