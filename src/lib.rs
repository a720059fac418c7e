//! Self-registering HTTP reverse proxy library

pub mod config;
pub mod http;
pub mod net;
pub mod routing;
pub mod health;
pub mod load_balancer;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::ServicePool;
