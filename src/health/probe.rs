//! TCP liveness dial.
//!
//! A service counts as alive when a TCP connection to its host and port
//! completes within the timeout. No HTTP exchange takes place.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;
use url::Url;

use crate::load_balancer::service::authority;

/// Dial the service's host and port. Returns true on a completed connect.
pub async fn dial(url: &Url, timeout: Duration) -> bool {
    let addr = authority(url);

    match time::timeout(timeout, TcpStream::connect(addr.as_str())).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            tracing::debug!(addr = %addr, error = %e, "Service unreachable");
            false
        }
        Err(_) => {
            tracing::debug!(addr = %addr, timeout = ?timeout, "Service dial timed out");
            false
        }
    }
}
