//! Metrics and Monitoring Adapters
//!
//! Prometheus registry plus an axum 0.7 server exposing `/live`,
//! `/ready` and `/metrics` on the configured bind address.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
