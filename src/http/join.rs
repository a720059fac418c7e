//! Join endpoints.
//!
//! # Endpoints
//! - `GET /rebalance/join?port=P`: self-report join. The host is the
//!   caller's observed IP; only the port comes from the caller.
//! - `GET /rebalance/local-join?host=H` (alias `/rebalance/joinconfig`):
//!   explicit join, `H` is trusted as given.
//!
//! Both answer `200 success join`, `200 already exists`, or
//! `400 {"error": "..."}`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::http::server::AppState;
use crate::load_balancer::{PoolError, Service};
use crate::observability::metrics;

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    pub port: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocalJoinParams {
    pub host: Option<String>,
}

pub async fn handle_join(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<JoinParams>,
) -> Response {
    let target = match self_report_target(addr.ip(), params.port.as_deref()) {
        Ok(target) => target,
        Err(e) => return join_response(Err(e)),
    };

    tracing::info!(host = %target, "Requested join");
    join_response(state.router.pool().add(&target).await)
}

pub async fn handle_local_join(
    State(state): State<AppState>,
    Query(params): Query<LocalJoinParams>,
) -> Response {
    let host = params.host.unwrap_or_default();
    tracing::info!(host = %host, "Requested local join");
    join_response(state.router.pool().add(&host).await)
}

/// Target URL for a self-reported join: `http://{observed ip}:{port}`.
pub fn self_report_target(ip: IpAddr, port: Option<&str>) -> Result<String, PoolError> {
    let raw = port.map(str::trim).unwrap_or_default();
    let invalid = |reason: &str| PoolError::InvalidUrl {
        url: format!("{}:{}", ip, raw),
        reason: reason.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid("missing port"));
    }
    let port: u16 = raw.parse().map_err(|_| invalid("port is not a number in 1-65535"))?;
    if port == 0 {
        return Err(invalid("port is not a number in 1-65535"));
    }

    // Dual-stack listeners report IPv4 peers as ::ffff:a.b.c.d.
    Ok(format!("http://{}", SocketAddr::new(ip.to_canonical(), port)))
}

fn join_response(result: Result<Arc<Service>, PoolError>) -> Response {
    match result {
        Ok(service) => {
            tracing::info!(service = %service.id(), "Success join");
            metrics::record_join("joined");
            (StatusCode::OK, "success join").into_response()
        }
        Err(PoolError::AlreadyRegistered(id)) => {
            tracing::info!(service = %id, "Service already exists");
            metrics::record_join("exists");
            (StatusCode::OK, "already exists").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Join failed");
            metrics::record_join("failed");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
