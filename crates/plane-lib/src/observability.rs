//! Observability infrastructure for the control plane
//!
//! Provides:
//! - Prometheus metrics (group lifecycle, scaling, inference latency)
//! - Structured JSON logging of lifecycle events with tracing

use crate::error::CreateGroupError;
use crate::models::{DeleteOutcome, ScaleOutcome};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for inference round-trips (in seconds)
const INFERENCE_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PlaneMetricsInner> = OnceLock::new();

struct PlaneMetricsInner {
    groups_created: IntCounter,
    group_create_failures: IntCounterVec,
    groups_deleted: IntCounter,
    incomplete_deletions: IntCounter,
    scale_operations: IntCounterVec,
    inference_requests: IntCounter,
    inference_failures: IntCounter,
    inference_latency_seconds: Histogram,
}

impl PlaneMetricsInner {
    fn new() -> Self {
        Self {
            groups_created: register_int_counter!(
                "model_plane_groups_created_total",
                "Model deployment groups created successfully"
            )
            .expect("Failed to register groups_created"),

            group_create_failures: register_int_counter_vec!(
                "model_plane_group_create_failures_total",
                "Group creations that failed, by stage",
                &["stage"]
            )
            .expect("Failed to register group_create_failures"),

            groups_deleted: register_int_counter!(
                "model_plane_groups_deleted_total",
                "Group teardowns performed"
            )
            .expect("Failed to register groups_deleted"),

            incomplete_deletions: register_int_counter!(
                "model_plane_incomplete_deletions_total",
                "Group teardowns that left at least one resource behind or missing"
            )
            .expect("Failed to register incomplete_deletions"),

            scale_operations: register_int_counter_vec!(
                "model_plane_scale_operations_total",
                "Scaling operations, by operation and outcome",
                &["operation", "outcome"]
            )
            .expect("Failed to register scale_operations"),

            inference_requests: register_int_counter!(
                "model_plane_inference_requests_total",
                "Inference requests proxied to model workloads"
            )
            .expect("Failed to register inference_requests"),

            inference_failures: register_int_counter!(
                "model_plane_inference_failures_total",
                "Proxied inference requests that failed"
            )
            .expect("Failed to register inference_failures"),

            inference_latency_seconds: register_histogram!(
                "model_plane_inference_latency_seconds",
                "Round-trip time of proxied inference requests",
                INFERENCE_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),
        }
    }
}

/// Control-plane metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct PlaneMetrics {
    _private: (),
}

impl Default for PlaneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlaneMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaneMetrics").finish()
    }
}

impl PlaneMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PlaneMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PlaneMetricsInner {
        GLOBAL_METRICS.get_or_init(PlaneMetricsInner::new)
    }

    pub fn inc_groups_created(&self) {
        self.inner().groups_created.inc();
    }

    pub fn inc_group_create_failures(&self, stage: &str) {
        self.inner()
            .group_create_failures
            .with_label_values(&[stage])
            .inc();
    }

    pub fn record_deletion(&self, outcome: &DeleteOutcome) {
        self.inner().groups_deleted.inc();
        if !outcome.is_complete() {
            self.inner().incomplete_deletions.inc();
        }
    }

    pub fn record_scale(&self, operation: &str, outcome: &ScaleOutcome) {
        let label = match outcome {
            ScaleOutcome::Scaled { .. } => "scaled",
            ScaleOutcome::Unchanged { .. } => "unchanged",
            ScaleOutcome::Rejected { .. } => "rejected",
        };
        self.inner()
            .scale_operations
            .with_label_values(&[operation, label])
            .inc();
    }

    /// Record one proxied inference call
    pub fn observe_inference(&self, duration_secs: f64, success: bool) {
        self.inner().inference_requests.inc();
        self.inner().inference_latency_seconds.observe(duration_secs);
        if !success {
            self.inner().inference_failures.inc();
        }
    }
}

/// Structured logger for group lifecycle events
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    namespace: String,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn log_group_created(&self, group: &str, image: &str, container_port: i32) {
        info!(
            event = "group_created",
            namespace = %self.namespace,
            group = %group,
            image = %image,
            container_port = container_port,
            "Model deployment group created"
        );
    }

    pub fn log_group_create_failed(&self, err: &CreateGroupError) {
        let rolled_back: Vec<String> = err.rolled_back.iter().map(|r| r.to_string()).collect();
        warn!(
            event = "group_create_failed",
            namespace = %self.namespace,
            group = %err.group,
            stage = %err.stage,
            error = %err.source,
            rolled_back = ?rolled_back,
            rollback_failures = err.rollback_failures.len(),
            "Model deployment group creation failed"
        );
    }

    pub fn log_group_deleted(&self, group: &str, outcome: &DeleteOutcome) {
        let deleted: Vec<String> = outcome.deleted.iter().map(|r| r.to_string()).collect();
        let failed: Vec<String> = outcome
            .failed_to_delete
            .iter()
            .map(|f| format!("{}: {}", f.resource, f.reason))
            .collect();
        info!(
            event = "group_deleted",
            namespace = %self.namespace,
            group = %group,
            deleted = ?deleted,
            failed_to_delete = ?failed,
            "Model deployment group torn down"
        );
    }

    pub fn log_scaled(&self, operation: &str, outcome: &ScaleOutcome) {
        match outcome {
            ScaleOutcome::Scaled { deployment, from, to } => info!(
                event = "group_scaled",
                namespace = %self.namespace,
                operation = %operation,
                deployment = %deployment,
                from = from,
                to = to,
                "Workload replicas updated"
            ),
            ScaleOutcome::Unchanged { deployment, replicas } => info!(
                event = "group_scale_unchanged",
                namespace = %self.namespace,
                operation = %operation,
                deployment = %deployment,
                replicas = replicas,
                "Workload already at requested replicas"
            ),
            ScaleOutcome::Rejected {
                deployment,
                replicas,
                reason,
            } => warn!(
                event = "group_scale_rejected",
                namespace = %self.namespace,
                operation = %operation,
                deployment = %deployment,
                replicas = replicas,
                reason = %reason,
                "Scaling request rejected"
            ),
        }
    }

    pub fn log_startup(&self, version: &str, orchestrator: &str) {
        info!(
            event = "control_plane_started",
            namespace = %self.namespace,
            version = %version,
            orchestrator = %orchestrator,
            "Model control plane started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "control_plane_shutdown",
            namespace = %self.namespace,
            reason = %reason,
            "Model control plane shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceKind, ResourceRef};

    #[test]
    fn test_plane_metrics_creation() {
        // Metrics live in the global Prometheus registry; repeated handles share it.
        let metrics = PlaneMetrics::new();
        let again = PlaneMetrics::new();

        metrics.inc_groups_created();
        metrics.inc_group_create_failures("workload");
        again.record_deletion(&DeleteOutcome {
            deleted: vec![ResourceRef::new(ResourceKind::Service, "s")],
            failed_to_delete: vec![],
        });
        again.record_scale(
            "step",
            &ScaleOutcome::Unchanged {
                deployment: "d".to_string(),
                replicas: 100,
            },
        );
        metrics.observe_inference(0.02, true);
        metrics.observe_inference(0.5, false);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("model-deployments");
        assert_eq!(logger.namespace, "model-deployments");
    }
}
