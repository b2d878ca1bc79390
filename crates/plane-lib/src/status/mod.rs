//! Read-only views over deployed groups and their pods
//!
//! Listings degrade per item: a missing service or unreadable log is
//! attached to the affected record instead of failing the whole call.

mod views;


pub use views::{
    ConditionView, ContainerView, GroupStatus, OwnerView, PodView, PodWithServices, PortView,
    ServiceView, VolumeMountView, VolumeView,
};

use crate::cluster::ClusterApi;
use crate::error::{Error, Result};
use crate::naming::{canonical_from_deployment, service_for_deployment, APP_LABEL};
use k8s_openapi::api::core::v1::{Pod, Service};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pods whose `app` label equals `canonical`
pub fn pods_for_canonical<'a>(pods: &'a [Pod], canonical: &str) -> Vec<&'a Pod> {
    pods.iter()
        .filter(|pod| {
            pod.metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(APP_LABEL))
                .map(|app| app == canonical)
                .unwrap_or(false)
        })
        .collect()
}

/// True when every selector entry is present among `labels`.
///
/// An empty selector matches nothing.
pub fn selector_matches(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> bool {
    !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Builds status listings from orchestrator reads
pub struct StatusAggregator {
    cluster: Arc<dyn ClusterApi>,
    log_tail_lines: Option<i64>,
}

impl StatusAggregator {
    pub fn new(cluster: Arc<dyn ClusterApi>, log_tail_lines: Option<i64>) -> Self {
        Self {
            cluster,
            log_tail_lines,
        }
    }

    /// Every workload in `namespace` with its companion service, newest first
    pub async fn list_groups(&self, namespace: &str) -> Result<Vec<GroupStatus>> {
        let mut deployments = self.cluster.list_deployments(namespace).await?;
        deployments.sort_by_key(|d| {
            std::cmp::Reverse(d.metadata.creation_timestamp.as_ref().map(|t| t.0))
        });

        let mut groups = Vec::with_capacity(deployments.len());
        for deployment in &deployments {
            let name = deployment.metadata.name.clone().unwrap_or_default();
            let canonical = canonical_from_deployment(&name);
            let service_name = service_for_deployment(&name);

            let service = match self.cluster.get_service(namespace, &service_name).await {
                Ok(svc) => ServiceView::from_service(&svc),
                Err(err) => {
                    debug!(deployment = %name, error = %err, "Companion service unavailable");
                    ServiceView::unavailable(service_name, err.to_string())
                }
            };
            groups.push(GroupStatus::from_deployment(
                canonical, deployment, namespace, service,
            ));
        }
        Ok(groups)
    }

    /// Pods belonging to the group behind `deployment`
    pub async fn list_pods_for_group(
        &self,
        namespace: &str,
        deployment: &str,
    ) -> Result<Vec<PodView>> {
        let deployment = deployment.trim();
        if deployment.is_empty() {
            return Err(Error::validation("deployment name must not be empty"));
        }
        let canonical = canonical_from_deployment(deployment);
        let pods = self.cluster.list_pods(namespace).await?;
        Ok(pods_for_canonical(&pods, canonical)
            .into_iter()
            .map(PodView::from_pod)
            .collect())
    }

    /// Every pod in `namespace` joined with the services selecting it
    pub async fn list_all_pods_with_services(
        &self,
        namespace: &str,
    ) -> Result<Vec<PodWithServices>> {
        let pods = self.cluster.list_pods(namespace).await?;
        let services: Vec<Service> = self.cluster.list_services(namespace).await?;

        let mut joined = Vec::with_capacity(pods.len());
        for pod in &pods {
            let view = PodView::from_pod(pod);

            let (matched, error) = match pod.metadata.labels.as_ref().filter(|l| !l.is_empty()) {
                Some(labels) => {
                    let matched = services
                        .iter()
                        .filter(|svc| {
                            svc.spec
                                .as_ref()
                                .and_then(|s| s.selector.as_ref())
                                .map(|sel| selector_matches(sel, labels))
                                .unwrap_or(false)
                        })
                        .map(ServiceView::from_service)
                        .collect();
                    (matched, None)
                }
                None => (Vec::new(), Some("pod has no labels".to_string())),
            };

            let (logs, logs_error) = match self
                .cluster
                .pod_logs(namespace, &view.name, self.log_tail_lines)
                .await
            {
                Ok(text) => (Some(text), None),
                Err(err) => {
                    warn!(pod = %view.name, error = %err, "Failed to fetch pod logs");
                    (None, Some(err.to_string()))
                }
            };

            joined.push(PodWithServices {
                pod: view,
                services: matched,
                error,
                logs,
                logs_error,
            });
        }
        Ok(joined)
    }

    /// Raw log text of one pod
    pub async fn fetch_logs(&self, namespace: &str, pod: &str) -> Result<String> {
        let pod = pod.trim();
        if pod.is_empty() {
            return Err(Error::validation("pod name must not be empty"));
        }
        Ok(self
            .cluster
            .pod_logs(namespace, pod, self.log_tail_lines)
            .await?)
    }
}
