//! Service pool management.
//!
//! # Responsibilities
//! - Register services (dedup, probe, build forwarding handler)
//! - Select the next alive service for a request
//! - Flip liveness for the router and the health monitor

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use axum::body::Body;
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::config::ProxyConfig;
use crate::health::probe;
use crate::load_balancer::{
    PoolError,
    forward::{build_client, HttpForwarder},
    round_robin::RoundRobin,
    service::{parse_target, service_id, Service},
};
use crate::observability::metrics;

/// Entry list and dedup index; only ever mutated together.
#[derive(Debug, Default)]
struct Entries {
    services: Vec<Arc<Service>>,
    index: HashSet<String>,
}

/// The ordered, deduplicated set of registered services.
///
/// Services only enter through [`ServicePool::add`], which dials first:
///
/// ```compile_fail
/// use rebalance::load_balancer::{Service, ServicePool};
///
/// fn skip_dial(pool: &ServicePool, service: Service) {
///     let _ = pool.register(service);
/// }
/// ```
#[derive(Debug)]
pub struct ServicePool {
    entries: RwLock<Entries>,
    balancer: RoundRobin,
    client: Client<HttpConnector, Body>,
    dial_timeout: Duration,
    upstream_timeout: Duration,
}

impl ServicePool {
    /// Create an empty pool from configuration.
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            balancer: RoundRobin::new(),
            client: build_client(&config.upstream),
            dial_timeout: config.health_check.dial_timeout(),
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        }
    }

    /// Register a target after a successful liveness dial.
    pub async fn add(&self, target: &str) -> Result<Arc<Service>, PoolError> {
        let url = parse_target(target)?;
        let id = service_id(&url);

        // Cheap early exit; `register` re-checks under the write lock.
        if self.read().index.contains(&id) {
            return Err(PoolError::AlreadyRegistered(id));
        }

        if !probe::dial(&url, self.dial_timeout).await {
            return Err(PoolError::Unreachable(id));
        }

        let forwarder = HttpForwarder::new(&url, self.client.clone(), self.upstream_timeout)
            .map_err(|e| PoolError::InvalidUrl { url: id.clone(), reason: e.to_string() })?;

        self.register(Service::new(url, Arc::new(forwarder)))
    }

    /// Append an already built service without probing it.
    pub(crate) fn register(&self, service: Service) -> Result<Arc<Service>, PoolError> {
        let mut entries = self.write();
        if !entries.index.insert(service.id().to_string()) {
            return Err(PoolError::AlreadyRegistered(service.id().to_string()));
        }

        let service = Arc::new(service);
        entries.services.push(service.clone());

        tracing::info!(service = %service.id(), pool_size = entries.services.len(), "Service registered");
        metrics::record_service_alive(service.id(), true);
        Ok(service)
    }

    /// Next alive service in rotation, or `None` if nothing is alive.
    pub fn next_alive(&self) -> Option<Arc<Service>> {
        let entries = self.read();
        let service = self.balancer.next_server(&entries.services);
        if service.is_none() {
            tracing::debug!(pool_size = entries.services.len(), "No alive service in pool");
        }
        service
    }

    pub fn mark_dead(&self, service: &Service) {
        if service.set_alive(false) {
            tracing::warn!(service = %service.id(), "Service marked dead");
        }
        metrics::record_service_alive(service.id(), false);
    }

    pub fn mark_alive(&self, service: &Service) {
        if !service.set_alive(true) {
            tracing::info!(service = %service.id(), "Service back alive");
        }
        metrics::record_service_alive(service.id(), true);
    }

    /// Dial the service without touching its liveness flag.
    pub async fn probe(&self, service: &Service) -> bool {
        probe::dial(service.url(), self.dial_timeout).await
    }

    /// Snapshot of all services in rotation order.
    pub fn services(&self) -> Vec<Arc<Service>> {
        self.read().services.clone()
    }

    pub fn contains(&self, target: &str) -> bool {
        match parse_target(target) {
            Ok(url) => self.read().index.contains(&service_id(&url)),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every critical section leaves `Entries` consistent, so a poisoned
    // lock still guards valid data.
    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ServicePool {
    fn default() -> Self {
        Self::new(&ProxyConfig::default())
    }
}
