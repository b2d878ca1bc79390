//! Orchestrator API access
//!
//! The control plane talks to the cluster exclusively through the
//! [`ClusterApi`] trait. [`KubeCluster`] backs it with a real Kubernetes
//! API server; [`InMemoryCluster`] keeps everything in process for local
//! development and tests.

mod kubernetes;
mod memory;

pub use kubernetes::{KubeCluster, KubeClusterOptions};
pub use memory::{ClusterOp, InMemoryCluster};

use crate::error::ClusterError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};

pub use async_trait::async_trait;

/// Result of a single orchestrator call
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Namespaced resource API for the kinds a model group is made of
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_namespace(&self, name: &str) -> ClusterResult<Namespace>;
    async fn create_namespace(&self, namespace: &Namespace) -> ClusterResult<Namespace>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<Deployment>;
    async fn get_deployment(&self, namespace: &str, name: &str) -> ClusterResult<Deployment>;
    /// Replace a deployment; a stale `resourceVersion` yields `Conflict`
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<Deployment>;
    async fn list_deployments(&self, namespace: &str) -> ClusterResult<Vec<Deployment>>;
    async fn delete_deployment(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    async fn create_service(&self, namespace: &str, service: &Service) -> ClusterResult<Service>;
    async fn get_service(&self, namespace: &str, name: &str) -> ClusterResult<Service>;
    async fn list_services(&self, namespace: &str) -> ClusterResult<Vec<Service>>;
    async fn delete_service(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    async fn create_autoscaler(
        &self,
        namespace: &str,
        autoscaler: &HorizontalPodAutoscaler,
    ) -> ClusterResult<HorizontalPodAutoscaler>;
    async fn get_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<HorizontalPodAutoscaler>;
    async fn delete_autoscaler(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    async fn list_pods(&self, namespace: &str) -> ClusterResult<Vec<Pod>>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> ClusterResult<()>;
    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        tail_lines: Option<i64>,
    ) -> ClusterResult<String>;
}
