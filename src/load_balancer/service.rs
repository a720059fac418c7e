//! Service abstraction.
//!
//! # Responsibilities
//! - Represent a single registered backend
//! - Own the forwarding handler bound to its URL
//! - Track liveness independently of the pool lock

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use url::Url;

use crate::load_balancer::forward::{Forward, ForwardError};
use crate::load_balancer::PoolError;

/// A single registered backend.
#[derive(Debug)]
pub struct Service {
    /// Normalized URL, the identity used for deduplication.
    id: String,
    url: Url,
    forwarder: Arc<dyn Forward>,
    alive: AtomicBool,
}

impl Service {
    /// Create a service that starts out alive.
    pub fn new(url: Url, forwarder: Arc<dyn Forward>) -> Self {
        Self {
            id: service_id(&url),
            url,
            forwarder,
            alive: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Set liveness, returning the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Dispatch one request through this service's forwarding handler.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        self.forwarder.forward(request).await
    }
}

/// Parse a target into a forwardable URL.
///
/// Bare `host:port` targets are treated as `http://host:port`. Only plain
/// HTTP upstreams with a host are accepted.
pub fn parse_target(target: &str) -> Result<Url, PoolError> {
    let target = target.trim();
    let invalid = |reason: &str| PoolError::InvalidUrl {
        url: target.to_string(),
        reason: reason.to_string(),
    };

    if target.is_empty() {
        return Err(invalid("empty url"));
    }

    let url = if target.contains("://") {
        Url::parse(target)
    } else {
        Url::parse(&format!("http://{}", target))
    }
    .map_err(|e| invalid(&e.to_string()))?;

    if url.scheme() != "http" {
        return Err(invalid("only http upstreams are supported"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    Ok(url)
}

/// Identity of a service: its URL without the trailing slash `Url` adds.
pub fn service_id(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// `host:port` of a URL, suitable for a TCP dial.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port_or_known_default() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
