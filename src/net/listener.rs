//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve and bind the configured address
//! - Report bind failures as a fatal startup error

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Configured address is not a socket address.
    Address(std::net::AddrParseError),
    /// Failed to bind to address.
    Bind(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Address(e) => write!(f, "Invalid bind address: {}", e),
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Bind to the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(ListenerError::Address)?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(ListenerError::Bind)?;

    let local_addr = listener
        .local_addr()
        .map_err(ListenerError::Bind)?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let config = ListenerConfig { bind_address: "127.0.0.1:0".into() };
        let listener = bind(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_taken_port_fails() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ListenerConfig { bind_address: taken.local_addr().unwrap().to_string() };
        assert!(matches!(bind(&config).await, Err(ListenerError::Bind(_))));
    }

    #[tokio::test]
    async fn test_bind_bad_address() {
        let config = ListenerConfig { bind_address: "nowhere".into() };
        assert!(matches!(bind(&config).await, Err(ListenerError::Address(_))));
    }
}
