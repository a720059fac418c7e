//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the join endpoints and the proxy fallback
//! - Wire up middleware (tracing, limits, request ID, join timeout)
//! - Spawn the health monitor next to the listener
//! - Graceful stop with a bounded drain period

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::health::active::HealthMonitor;
use crate::http::join::{handle_join, handle_local_join};
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::load_balancer::pool::ServicePool;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::routing::{ProxyRequest, RequestRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: RequestRouter,
    pub max_body_size: usize,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<ServicePool>,
}

impl HttpServer {
    /// Create a new HTTP server with an empty pool.
    pub fn new(config: ProxyConfig) -> Self {
        let pool = Arc::new(ServicePool::new(&config));
        Self::with_pool(config, pool)
    }

    /// Create a server around an existing pool.
    pub fn with_pool(config: ProxyConfig, pool: Arc<ServicePool>) -> Self {
        let state = AppState {
            router: RequestRouter::new(pool.clone(), RetryPolicy::from(&config.retries)),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/rebalance/join", get(handle_join))
            .route("/rebalance/local-join", get(handle_local_join))
            .route("/rebalance/joinconfig", get(handle_local_join))
            // Proxied requests are bounded by the retry loop instead.
            .route_layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain for the grace period.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.pool.len(),
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(self.pool.clone(), self.config.health_check.clone());
            tokio::spawn(monitor.run(shutdown.subscribe()));
        }

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .into_future();
        let mut server = std::pin::pin!(server);

        tokio::select! {
            result = &mut server => result?,
            _ = shutdown.wait() => {
                tracing::info!(grace_secs = grace.as_secs(), "Draining in-flight requests");
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!("Grace period expired, closing with requests in flight"),
                }
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The service pool behind this server.
    pub fn pool(&self) -> &Arc<ServicePool> {
        &self.pool
    }

    /// The fully layered router, without connection info.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Proxy handler for every path not claimed by the join endpoints.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();
    let request_id = request_id(&parts.headers).to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %parts.uri.path(),
        client = %addr,
        "Proxying request"
    );

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to buffer request body");
            metrics::record_request(&method, 413, start_time);
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let response = state
        .router
        .route(&ProxyRequest::new(parts, body, Some(addr)))
        .await;

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_empty_pool_returns_503_with_request_id() {
        let server = HttpServer::new(ProxyConfig::default());
        let app = server.app().layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));

        let response = app
            .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"service not available");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = ProxyConfig::default();
        config.security.max_body_size = 8;
        let server = HttpServer::new(config);
        let app = server.app().layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/upload")
                    .body(Body::from("far more than eight bytes"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = ProxyConfig::default();
        config.health_check.enabled = false;
        let server = HttpServer::new(config);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();

        let handle = tokio::spawn(server.run(listener, shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}
