//! Client used by sidecar processes to register services with a rebalance proxy.

mod client;

pub use client::{JoinError, SideCar, DEFAULT_SERVICE_PORT};
