//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch to a service fails:
//!     → retries.rs (retry same service after backoff while retries remain)
//!     → exhausted: service marked dead, attempt counted
//!     → attempts remain: select another service
//!     → attempts exhausted: 503
//! ```
//!
//! # Design Decisions
//! - Every dispatch has a deadline (upstream timeout)
//! - Retries are bounded per service, attempts per request

pub mod retries;

pub use retries::{RetryPolicy, RetryState};
