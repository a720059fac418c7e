//! Startup orchestration.
//!
//! # Responsibilities
//! - Pre-register hosts listed in the startup hosts file
//!
//! # Design Decisions
//! - A missing hosts file is not an error
//! - A malformed hosts file is fatal
//! - A host that fails to register is logged and skipped

use std::path::Path;

use crate::config::loader::{load_hosts, ConfigError};
use crate::load_balancer::{PoolError, ServicePool};

/// Feed every host in `path` through `ServicePool::add`.
///
/// Returns how many hosts ended up registered by this call.
pub async fn preload_hosts(pool: &ServicePool, path: &Path) -> Result<usize, ConfigError> {
    let Some(hosts) = load_hosts(path)? else {
        tracing::info!(path = %path.display(), "Hosts file not found, skipping local join");
        return Ok(0);
    };

    tracing::info!(path = %path.display(), hosts = hosts.len(), "Running local join");

    let mut joined = 0;
    for host in &hosts {
        match pool.add(host).await {
            Ok(service) => {
                tracing::info!(service = %service.id(), "Joined from hosts file");
                joined += 1;
            }
            Err(PoolError::AlreadyRegistered(id)) => {
                tracing::info!(service = %id, "Host already joined");
            }
            Err(e) => tracing::error!(host = %host, error = %e, "Failed to join host"),
        }
    }

    Ok(joined)
}
