//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! proxy.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//!
//! config.json (optional host list)
//!     → loader::load_hosts
//!     → lifecycle::startup pre-registers each host in the pool
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ProxyConfig;
pub use schema::ListenerConfig;
pub use schema::HealthCheckConfig;
pub use schema::RetryConfig;
pub use schema::TimeoutConfig;
pub use schema::UpstreamConfig;
pub use schema::ObservabilityConfig;
