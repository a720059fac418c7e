//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig
//!     → listener.rs (parse + bind)
//!     → TcpListener handed to the HTTP server
//! ```

pub mod listener;

pub use listener::{bind, ListenerError};
