// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Redis operator.
//!
//! This module provides metrics collection with the namespace prefix
//! `redis_firestoned_io_` (prometheus-safe version of "redis.firestoned.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliation operations and their outcomes
//! - **Child Resource Metrics** - Track creation, updates, deletions and immutable drift
//! - **Error Metrics** - Track error conditions and types
//!
//! # Example
//!
//! ```rust,no_run
//! use redis_operator::metrics::record_reconciliation_success;
//!
//! // Record a successful reconciliation
//! record_reconciliation_success("Redis", std::time::Duration::from_secs(1));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "redis_firestoned_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `Redis`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `Redis`)
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `reason`: Reason for requeue (`periodic`, `error`)
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Child Resource Metrics
// ============================================================================

/// Total number of resources created
///
/// Labels:
/// - `resource_type`: Kind of resource created
pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_created_total"),
        "Total number of resources created by type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of resources updated
///
/// Labels:
/// - `resource_type`: Kind of resource updated
pub static RESOURCES_UPDATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_updated_total"),
        "Total number of resources updated by type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of resources deleted
///
/// Labels:
/// - `resource_type`: Kind of resource deleted
pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_deleted_total"),
        "Total number of resources deleted by type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of children whose immutable fields differ from the desired definition
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static IMMUTABLE_DRIFT_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_immutable_drift_total"),
        "Total number of immutable field differences detected and left untouched",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by resource type and error category
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `error_type`: Category of error (`not_found`, `conflict`, `unprocessable`, `transport`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by resource type and error category",
    );
    let counter = CounterVec::new(opts, &["resource_type", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled (e.g., `Redis`)
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeue
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `reason` - Reason for requeue (e.g., `periodic`, `error`)
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record resource creation
///
/// # Arguments
/// * `resource_type` - The kind of resource created
pub fn record_resource_created(resource_type: &str) {
    RESOURCES_CREATED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record resource update
///
/// # Arguments
/// * `resource_type` - The kind of resource updated
pub fn record_resource_updated(resource_type: &str) {
    RESOURCES_UPDATED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record resource deletion
///
/// # Arguments
/// * `resource_type` - The kind of resource deleted
pub fn record_resource_deleted(resource_type: &str) {
    RESOURCES_DELETED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record immutable drift left in place
///
/// # Arguments
/// * `resource_type` - The kind of resource whose immutable fields differ
pub fn record_immutable_drift(resource_type: &str) {
    IMMUTABLE_DRIFT_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record an error
///
/// # Arguments
/// * `resource_type` - The kind of resource where error occurred
/// * `error_type` - Category of error (e.g., `conflict`, `transport`)
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
