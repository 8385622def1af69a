//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socnet_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "socnet_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Domain Metrics
    pub static ref USERS_TOTAL: IntCounter = IntCounter::new(
        "socnet_users_created_total",
        "Number of users registered since start"
    ).expect("metric can be created");
    pub static ref POSTS_TOTAL: IntCounter = IntCounter::new(
        "socnet_posts_created_total",
        "Number of posts created since start"
    ).expect("metric can be created");
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socnet_notifications_issued_total", "Number of notifications issued"),
        &["kind"]
    ).expect("metric can be created");

    // Fan-out Metrics
    pub static ref FANOUT_TASKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socnet_fanout_tasks_total", "Fan-out task attempts by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref TIMELINE_ROWS_DELIVERED_TOTAL: IntCounter = IntCounter::new(
        "socnet_timeline_rows_delivered_total",
        "Timeline rows inserted by the fan-out worker"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socnet_errors_total", "Total number of errors returned to clients"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<(&str, Box<dyn prometheus::core::Collector>)> = vec![
            ("HTTP_REQUESTS_TOTAL", Box::new(HTTP_REQUESTS_TOTAL.clone())),
            (
                "HTTP_REQUEST_DURATION_SECONDS",
                Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
            ),
            ("USERS_TOTAL", Box::new(USERS_TOTAL.clone())),
            ("POSTS_TOTAL", Box::new(POSTS_TOTAL.clone())),
            ("NOTIFICATIONS_TOTAL", Box::new(NOTIFICATIONS_TOTAL.clone())),
            ("FANOUT_TASKS_TOTAL", Box::new(FANOUT_TASKS_TOTAL.clone())),
            (
                "TIMELINE_ROWS_DELIVERED_TOTAL",
                Box::new(TIMELINE_ROWS_DELIVERED_TOTAL.clone()),
            ),
            ("ERRORS_TOTAL", Box::new(ERRORS_TOTAL.clone())),
        ];

        for (name, collector) in collectors {
            if let Err(error) = REGISTRY.register(collector) {
                tracing::error!(%error, metric = name, "Failed to register metric");
            }
        }

        tracing::info!("Metrics registry initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_metrics();
        init_metrics();

        FANOUT_TASKS_TOTAL.with_label_values(&["delivered"]).inc();
        let names: Vec<_> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.iter().any(|name| name == "socnet_fanout_tasks_total"));
    }
}
