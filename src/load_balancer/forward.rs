//! Forwarding handlers.
//!
//! A forwarding handler copies one request to a fixed upstream and hands
//! the upstream response back unbuffered. It never retries; failures are
//! returned so the request router can decide between retry and failover.

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{Request, Response, Uri};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::UpstreamConfig;
use crate::load_balancer::service::authority;

/// Failure to get a response out of a backend.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("cannot build upstream request: {0}")]
    Request(String),
}

pub type ForwardFuture<'a> = BoxFuture<'a, Result<Response<Body>, ForwardError>>;

/// Something that can carry a request to one backend.
pub trait Forward: Send + Sync + std::fmt::Debug {
    fn forward(&self, request: Request<Body>) -> ForwardFuture<'_>;
}

/// Shared pooled HTTP client used by every forwarding handler.
pub fn build_client(config: &UpstreamConfig) -> Client<HttpConnector, Body> {
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build(HttpConnector::new())
}

/// Forwards over HTTP to a single upstream host.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    authority: Authority,
    base_path: String,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(target: &Url, client: Client<HttpConnector, Body>, timeout: Duration) -> Result<Self, ForwardError> {
        let authority = Authority::from_str(&authority(target))
            .map_err(|e| ForwardError::Request(e.to_string()))?;

        Ok(Self {
            authority,
            base_path: target.path().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    /// Point the request URI at the upstream, keeping path and query.
    fn upstream_uri(&self, uri: &Uri) -> Result<Uri, ForwardError> {
        let path_and_query = uri.path_and_query().map(PathAndQuery::as_str).unwrap_or("/");
        let joined = format!("{}{}", self.base_path, path_and_query);

        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        parts.path_and_query = Some(
            PathAndQuery::from_str(&joined).map_err(|e| ForwardError::Request(e.to_string()))?,
        );

        Uri::from_parts(parts).map_err(|e| ForwardError::Request(e.to_string()))
    }
}

impl Forward for HttpForwarder {
    fn forward(&self, request: Request<Body>) -> ForwardFuture<'_> {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            parts.uri = self.upstream_uri(&parts.uri)?;
            let request = Request::from_parts(parts, body);

            match tokio::time::timeout(self.timeout, self.client.request(request)).await {
                Ok(Ok(response)) => {
                    let (parts, body) = response.into_parts();
                    Ok(Response::from_parts(parts, Body::new(body)))
                }
                Ok(Err(e)) => Err(ForwardError::Transport(e)),
                Err(_) => Err(ForwardError::Timeout(self.timeout)),
            }
        })
    }
}
