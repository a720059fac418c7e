//! Request routing with retry and failover.
//!
//! # Responsibilities
//! - Pick the next alive service for each client request
//! - Retry transient failures against the same service
//! - Demote a service whose retries are exhausted and fail over
//! - Answer 503 once the pool has nothing left to offer
//!
//! # Design Decisions
//! - The state machine is a bounded loop, not re-entrant dispatch
//! - Request bodies are buffered once and replayed per dispatch
//! - Only transport failures count; any upstream response is passed through

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, request, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;

use crate::load_balancer::{Service, ServicePool};
use crate::observability::metrics;
use crate::resilience::{RetryPolicy, RetryState};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// A client request buffered so it can be dispatched more than once.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl ProxyRequest {
    /// Prepare an inbound request for forwarding.
    pub fn new(parts: request::Parts, body: Bytes, client: Option<SocketAddr>) -> Self {
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        if !headers.contains_key(&X_FORWARDED_HOST) {
            if let Some(host) = headers.get(header::HOST).cloned() {
                headers.insert(X_FORWARDED_HOST, host);
            }
        }

        if let Some(addr) = client {
            let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(prior) => format!("{}, {}", prior, addr.ip()),
                None => addr.ip().to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }

        Self {
            method: parts.method,
            uri: parts.uri,
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Build a fresh request for one dispatch.
    fn to_request(&self) -> Request<Body> {
        let mut request = Request::new(Body::from(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }
}

/// Routes client requests over the service pool.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    pool: Arc<ServicePool>,
    policy: RetryPolicy,
}

impl RequestRouter {
    pub fn new(pool: Arc<ServicePool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &Arc<ServicePool> {
        &self.pool
    }

    /// Serve one client request, failing over across services as needed.
    pub async fn route(&self, request: &ProxyRequest) -> Response<Body> {
        let mut state = RetryState::default();

        loop {
            if self.policy.attempts_exhausted(&state) {
                tracing::info!(
                    method = %request.method,
                    path = %request.uri.path(),
                    attempts = state.attempts,
                    "Max attempts reached, terminating"
                );
                return unavailable();
            }

            let Some(service) = self.pool.next_alive() else {
                tracing::warn!(path = %request.uri.path(), attempts = state.attempts, "No alive service");
                return unavailable();
            };

            if let Some(mut response) = self.dispatch(&service, request, &mut state).await {
                strip_hop_by_hop(response.headers_mut());
                return response;
            }

            self.pool.mark_dead(&service);
            state.record_failover();
            tracing::info!(
                path = %request.uri.path(),
                attempt = state.attempts,
                "Attempting another service"
            );
        }
    }

    /// Dispatch to one service until it answers or its retries run out.
    async fn dispatch(
        &self,
        service: &Service,
        request: &ProxyRequest,
        state: &mut RetryState,
    ) -> Option<Response<Body>> {
        loop {
            match service.forward(request.to_request()).await {
                Ok(response) => return Some(response),
                Err(e) => {
                    tracing::warn!(
                        service = %service.id(),
                        retry = state.retries,
                        attempt = state.attempts,
                        error = %e,
                        "Upstream error"
                    );
                    metrics::record_upstream_failure(service.id());

                    if !self.policy.can_retry(state) {
                        return None;
                    }
                    tokio::time::sleep(self.policy.backoff).await;
                    state.record_retry();
                }
            }
        }
    }
}

fn unavailable() -> Response<Body> {
    (StatusCode::SERVICE_UNAVAILABLE, "service not available").into_response()
}

/// Remove the fixed hop-by-hop set plus every header named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
