//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Auth Metrics
    pub static ref AUTH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codeiq_auth_events_total", "Total number of auth flow outcomes"),
        &["event", "outcome"]
    ).expect("metric can be created");
    pub static ref SESSIONS_SWEPT_TOTAL: IntCounter = IntCounter::new(
        "codeiq_sessions_swept_total",
        "Total number of expired sessions deleted by the sweeper"
    ).expect("metric can be created");

    // Upstream Metrics
    pub static ref GITHUB_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codeiq_github_requests_total", "Total number of requests sent to GitHub"),
        &["endpoint", "status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codeiq_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(AUTH_EVENTS_TOTAL.clone()))
            .expect("AUTH_EVENTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_SWEPT_TOTAL.clone()))
            .expect("SESSIONS_SWEPT_TOTAL can be registered");
        REGISTRY
            .register(Box::new(GITHUB_REQUESTS_TOTAL.clone()))
            .expect("GITHUB_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
