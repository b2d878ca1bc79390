//! Model deployment group lifecycle
//!
//! A group is a workload, an autoscaler bound to it, and a service in
//! front of its pods. Creation runs as a sequence of compensable steps:
//! when a later step fails, the children this call already created are
//! deleted again in reverse order. Teardown attempts every child
//! independently and reports per-resource results instead of failing.

mod locks;
pub mod spec;

#[cfg(test)]
mod tests;

pub use locks::{GroupGuard, GroupLocks};

use crate::cluster::{ClusterApi, ClusterResult};
use crate::error::{ClusterError, CreateGroupError, CreateStage, Result};
use crate::models::{
    DeleteOutcome, FailedDeletion, GroupCreated, GroupTemplate, ResourceKind, ResourceRef,
    WorkloadSettings,
};
use crate::namespace::ensure_namespace;
use crate::naming::{GroupNames, APP_LABEL};
use crate::observability::{PlaneMetrics, StructuredLogger};
use std::sync::Arc;
use tracing::{debug, warn};

/// Creates and tears down model deployment groups
pub struct GroupManager {
    cluster: Arc<dyn ClusterApi>,
    namespace: String,
    settings: WorkloadSettings,
    locks: GroupLocks,
    metrics: PlaneMetrics,
    logger: StructuredLogger,
}

impl GroupManager {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        namespace: impl Into<String>,
        settings: WorkloadSettings,
        locks: GroupLocks,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            cluster,
            logger: StructuredLogger::new(namespace.clone()),
            namespace,
            settings,
            locks,
            metrics: PlaneMetrics::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Create the workload, autoscaler and service for one model
    pub async fn create(&self, template: &GroupTemplate) -> Result<GroupCreated> {
        let names = GroupNames::for_model(&template.model_name)?;
        let _guard = self.locks.lock(&names.canonical).await;
        let cluster = self.cluster.as_ref();
        let mut created: Vec<ResourceRef> = Vec::new();

        if let Err(source) = ensure_namespace(cluster, &self.namespace).await {
            return Err(self.abort(&names, CreateStage::Namespace, source, created).await);
        }

        let workload = spec::workload(&names, template, &self.settings, &self.namespace);
        match cluster.create_deployment(&self.namespace, &workload).await {
            Ok(_) => created.push(ResourceRef::new(ResourceKind::Deployment, &names.deployment)),
            Err(source) => {
                return Err(self.abort(&names, CreateStage::Workload, source, created).await)
            }
        }

        // Only reached with a workload in place for the autoscaler to target
        let autoscaler = spec::autoscaler(&names, &self.namespace);
        match cluster.create_autoscaler(&self.namespace, &autoscaler).await {
            Ok(_) => created.push(ResourceRef::new(
                ResourceKind::HorizontalPodAutoscaler,
                &names.autoscaler,
            )),
            Err(source) => {
                return Err(self.abort(&names, CreateStage::Autoscaler, source, created).await)
            }
        }

        let service = spec::service(&names, template, &self.namespace);
        if let Err(source) = cluster.create_service(&self.namespace, &service).await {
            return Err(self.abort(&names, CreateStage::Service, source, created).await);
        }

        self.metrics.inc_groups_created();
        self.logger
            .log_group_created(&names.canonical, &template.image, template.container_port);

        Ok(GroupCreated {
            message: format!(
                "Deployment for model {} created successfully in namespace {}.",
                names.canonical, self.namespace
            ),
            name: names.canonical,
            namespace: self.namespace.clone(),
            deployment: names.deployment,
            service: names.service,
            autoscaler: names.autoscaler,
        })
    }

    /// Compensate the children created so far and build the failure
    async fn abort(
        &self,
        names: &GroupNames,
        stage: CreateStage,
        source: ClusterError,
        created: Vec<ResourceRef>,
    ) -> crate::error::Error {
        let mut rolled_back = Vec::new();
        let mut rollback_failures = Vec::new();

        for resource in created.into_iter().rev() {
            match self.delete_child(&resource).await {
                Ok(()) => rolled_back.push(resource),
                Err(err) if err.is_not_found() => rolled_back.push(resource),
                Err(err) => {
                    warn!(resource = %resource, error = %err, "Rollback of group member failed");
                    rollback_failures.push(FailedDeletion {
                        resource,
                        reason: err.to_string(),
                        not_found: false,
                    });
                }
            }
        }

        let err = CreateGroupError {
            group: names.canonical.clone(),
            stage,
            source,
            rolled_back,
            rollback_failures,
        };
        self.metrics.inc_group_create_failures(&stage.to_string());
        self.logger.log_group_create_failed(&err);
        Box::new(err).into()
    }

    async fn delete_child(&self, resource: &ResourceRef) -> ClusterResult<()> {
        let cluster = self.cluster.as_ref();
        match resource.kind {
            ResourceKind::Deployment => {
                cluster.delete_deployment(&self.namespace, &resource.name).await
            }
            ResourceKind::Service => cluster.delete_service(&self.namespace, &resource.name).await,
            ResourceKind::HorizontalPodAutoscaler => {
                cluster.delete_autoscaler(&self.namespace, &resource.name).await
            }
            ResourceKind::Pod => cluster.delete_pod(&self.namespace, &resource.name).await,
            ResourceKind::Namespace => Ok(()),
        }
    }

    /// Tear down a group.
    ///
    /// Pods, workload, service and autoscaler are attempted independently.
    /// Only an unresolvable reference is an error; everything else lands
    /// in the returned outcome.
    pub async fn delete(&self, reference: &str) -> Result<DeleteOutcome> {
        let names = GroupNames::resolve(reference)?;
        let guard = self.locks.lock(&names.canonical).await;
        let mut outcome = DeleteOutcome::default();

        self.delete_pods(&names, &mut outcome).await;
        for resource in [
            ResourceRef::new(ResourceKind::Deployment, &names.deployment),
            ResourceRef::new(ResourceKind::Service, &names.service),
            ResourceRef::new(ResourceKind::HorizontalPodAutoscaler, &names.autoscaler),
        ] {
            let result = self.delete_child(&resource).await;
            record(&mut outcome, resource, result);
        }

        drop(guard);

        self.metrics.record_deletion(&outcome);
        self.logger.log_group_deleted(&names.canonical, &outcome);
        Ok(outcome)
    }

    async fn delete_pods(&self, names: &GroupNames, outcome: &mut DeleteOutcome) {
        let selector = format!("{}={}", APP_LABEL, names.canonical);
        let pods = match self.cluster.list_pods(&self.namespace).await {
            Ok(pods) => pods,
            Err(err) => {
                outcome.failed_to_delete.push(FailedDeletion {
                    resource: ResourceRef::new(ResourceKind::Pod, selector),
                    reason: err.to_string(),
                    not_found: false,
                });
                return;
            }
        };

        let matching: Vec<String> = pods
            .iter()
            .filter(|pod| {
                pod.metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(APP_LABEL))
                    .map(|app| app == &names.canonical)
                    .unwrap_or(false)
            })
            .filter_map(|pod| pod.metadata.name.clone())
            .collect();

        if matching.is_empty() {
            debug!(group = %names.canonical, "No pods to delete");
            outcome.failed_to_delete.push(FailedDeletion {
                resource: ResourceRef::new(ResourceKind::Pod, selector),
                reason: "not found".to_string(),
                not_found: true,
            });
            return;
        }

        for name in matching {
            let result = self.cluster.delete_pod(&self.namespace, &name).await;
            record(outcome, ResourceRef::new(ResourceKind::Pod, name), result);
        }
    }

    /// Delete a single pod; the owning workload will normally replace it
    pub async fn delete_pod(&self, pod_name: &str) -> Result<ResourceRef> {
        let pod_name = pod_name.trim();
        if pod_name.is_empty() {
            return Err(crate::error::Error::validation("pod name must not be empty"));
        }
        self.cluster.delete_pod(&self.namespace, pod_name).await?;
        Ok(ResourceRef::new(ResourceKind::Pod, pod_name))
    }
}

fn record(outcome: &mut DeleteOutcome, resource: ResourceRef, result: ClusterResult<()>) {
    match result {
        Ok(()) => outcome.deleted.push(resource),
        Err(err) if err.is_not_found() => outcome.failed_to_delete.push(FailedDeletion {
            resource,
            reason: "not found".to_string(),
            not_found: true,
        }),
        Err(err) => outcome.failed_to_delete.push(FailedDeletion {
            resource,
            reason: err.to_string(),
            not_found: false,
        }),
    }
}
