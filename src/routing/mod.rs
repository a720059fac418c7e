//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → router.rs (buffer body, state machine)
//!     → ServicePool::next_alive
//!     → Service forwarding handler
//!     → on failure: retry same service, then fail over
//!     → proxied response or 503
//! ```
//!
//! # Design Decisions
//! - One pool-wide rotation; every path is proxied
//! - Retry and attempt counters are per request
//! - Exhaustion is a normal outcome (503), not an error

pub mod router;

pub use router::{ProxyRequest, RequestRouter};
