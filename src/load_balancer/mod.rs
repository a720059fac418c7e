//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Join / startup host list
//!     → pool.rs (dedup check, liveness dial, append)
//!     → service.rs (URL identity + liveness flag)
//!     → forward.rs (forwarding handler bound to the URL)
//!
//! Request router
//!     → pool.rs next_alive()
//!     → round_robin.rs (rotate, skipping dead services)
//!     → Service forwarding handler
//! ```
//!
//! # Design Decisions
//! - Services are never removed; only their liveness toggles
//! - Entry list and dedup index share one lock
//! - Liveness is an atomic per service, flipped without the pool lock
//! - Empty or all-dead pool yields `None`, never blocks

pub mod forward;
pub mod pool;
pub mod round_robin;
pub mod service;

pub use forward::{Forward, ForwardError, HttpForwarder};
pub use pool::ServicePool;
pub use service::Service;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The URL is already in the pool. Callers treat this as success.
    #[error("service {0} already exists")]
    AlreadyRegistered(String),

    #[error("invalid service url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("cannot dial service {0}")]
    Unreachable(String),
}
