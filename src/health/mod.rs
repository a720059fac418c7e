//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Dial each service (probe.rs)
//!     → Mark alive / dead in the pool
//!
//! Passive failure detection lives in the request router:
//!     Retries against one service exhausted
//!     → Mark dead
//!     → Next sweep may bring it back
//! ```
//!
//! # Design Decisions
//! - Liveness is a plain TCP dial with a bounded timeout
//! - Probes in one sweep run concurrently
//! - Each flag flip is atomic

pub mod active;
pub mod probe;
