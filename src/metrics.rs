//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login flow
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounter = IntCounter::new(
        "questauth_login_attempts_total",
        "Total number of started login attempts"
    ).expect("metric can be created");
    pub static ref CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("questauth_callbacks_total", "Total number of OAuth callbacks handled"),
        &["outcome"]
    ).expect("metric can be created");

    // Provider calls
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "questauth_upstream_request_duration_seconds",
            "Identity provider request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("questauth_errors_total", "Total number of errors rendered"),
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
            .register(Box::new(LOGIN_ATTEMPTS_TOTAL.clone()))
            .expect("LOGIN_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CALLBACKS_TOTAL.clone()))
            .expect("CALLBACKS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()))
            .expect("UPSTREAM_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
