//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Preload hosts file → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop health monitor + stop accepting
//!     → Grace period for in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
