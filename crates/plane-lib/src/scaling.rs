//! Replica control for group workloads
//!
//! Every write is a read-modify-replace that carries the observed
//! `resourceVersion`, so a concurrent writer outside this process turns
//! into a `Conflict` instead of a lost update.

use crate::cluster::ClusterApi;
use crate::error::{Error, Result};
use crate::group::GroupLocks;
use crate::models::{ScaleOutcome, StepDirection};
use crate::naming::GroupNames;
use crate::observability::{PlaneMetrics, StructuredLogger};
use std::sync::Arc;
use tracing::debug;

/// Upper bound for relative scale-up
pub const MAX_STEP_REPLICAS: i32 = 100;
/// Lower bound for relative scale-down; only `stop` goes below it
pub const MIN_STEP_REPLICAS: i32 = 1;

/// Replica count assumed when the workload does not declare one
const DEFAULT_REPLICAS: i32 = 1;

/// What a relative step should do from the current replica count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPlan {
    Write(i32),
    Keep,
    Reject(String),
}

/// Plan one relative step without touching the orchestrator
pub fn plan_step(current: i32, direction: StepDirection) -> StepPlan {
    match direction {
        StepDirection::Up if current >= MAX_STEP_REPLICAS => StepPlan::Keep,
        StepDirection::Up => StepPlan::Write(current + 1),
        StepDirection::Down if current - 1 < MIN_STEP_REPLICAS => {
            StepPlan::Reject(format!("cannot scale below {}", MIN_STEP_REPLICAS))
        }
        StepDirection::Down => StepPlan::Write(current - 1),
    }
}

/// Scales group workloads
pub struct ScalingController {
    cluster: Arc<dyn ClusterApi>,
    namespace: String,
    locks: GroupLocks,
    metrics: PlaneMetrics,
    logger: StructuredLogger,
}

impl ScalingController {
    pub fn new(cluster: Arc<dyn ClusterApi>, namespace: impl Into<String>, locks: GroupLocks) -> Self {
        let namespace = namespace.into();
        Self {
            cluster,
            logger: StructuredLogger::new(namespace.clone()),
            namespace,
            locks,
            metrics: PlaneMetrics::new(),
        }
    }

    /// Set an absolute replica count
    pub async fn set_absolute(&self, reference: &str, replicas: i32) -> Result<ScaleOutcome> {
        if replicas < 0 {
            return Err(Error::validation("replicas must not be negative"));
        }
        self.apply("scale", reference, |_| StepPlan::Write(replicas)).await
    }

    /// Move one replica up or down
    pub async fn step(&self, reference: &str, direction: StepDirection) -> Result<ScaleOutcome> {
        let operation = match direction {
            StepDirection::Up => "scale_up",
            StepDirection::Down => "scale_down",
        };
        self.apply(operation, reference, |current| plan_step(current, direction))
            .await
    }

    /// Scale to zero
    pub async fn stop(&self, reference: &str) -> Result<ScaleOutcome> {
        self.apply("stop", reference, |_| StepPlan::Write(0)).await
    }

    /// Bring a stopped workload back to a single replica
    pub async fn start(&self, reference: &str) -> Result<ScaleOutcome> {
        self.apply("start", reference, |_| StepPlan::Write(1)).await
    }

    async fn apply<F>(&self, operation: &str, reference: &str, plan: F) -> Result<ScaleOutcome>
    where
        F: FnOnce(i32) -> StepPlan,
    {
        let names = GroupNames::resolve(reference)?;
        let _guard = self.locks.lock(&names.canonical).await;

        let mut workload = self
            .cluster
            .get_deployment(&self.namespace, &names.deployment)
            .await?;
        let current = workload
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(DEFAULT_REPLICAS);

        let outcome = match plan(current) {
            StepPlan::Keep => ScaleOutcome::Unchanged {
                deployment: names.deployment,
                replicas: current,
            },
            StepPlan::Reject(reason) => ScaleOutcome::Rejected {
                deployment: names.deployment,
                replicas: current,
                reason,
            },
            StepPlan::Write(target) => {
                debug!(deployment = %names.deployment, from = current, to = target, "Replacing workload replicas");
                // resourceVersion from the read stays in the metadata
                if let Some(spec) = workload.spec.as_mut() {
                    spec.replicas = Some(target);
                }
                self.cluster
                    .replace_deployment(&self.namespace, &workload)
                    .await?;
                ScaleOutcome::Scaled {
                    deployment: names.deployment,
                    from: current,
                    to: target,
                }
            }
        };

        self.metrics.record_scale(operation, &outcome);
        self.logger.log_scaled(operation, &outcome);
        Ok(outcome)
    }
}
