//! API layer
//!
//! HTTP handlers for:
//! - Repository routes behind the auth gate
//! - Metrics (Prometheus)

pub mod metrics;
mod repos;

pub use metrics::metrics_router;
pub use repos::repos_router;
