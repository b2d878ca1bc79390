//! Kubernetes-backed [`ClusterApi`] using kube-rs

use super::{async_trait, ClusterApi, ClusterResult};
use crate::error::ClusterError;
use crate::models::ResourceKind;
use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Connection options for the Kubernetes API server
#[derive(Debug, Clone)]
pub struct KubeClusterOptions {
    /// Explicit kubeconfig; in-cluster config or `~/.kube/config` otherwise
    pub kubeconfig: Option<PathBuf>,
    /// Upper bound for every API call
    pub timeout: Duration,
}

impl Default for KubeClusterOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`ClusterApi`] implementation talking to a Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    timeout: Duration,
}

impl KubeCluster {
    /// Build a client from the configured or inferred kubeconfig
    pub async fn connect(options: &KubeClusterOptions) -> Result<Self> {
        let mut config = match &options.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig from {:?}", path))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Failed to load kubeconfig")?
            }
            None => Config::infer()
                .await
                .context("Failed to infer Kubernetes configuration")?,
        };
        config.connect_timeout = Some(options.timeout);
        config.read_timeout = Some(options.timeout);

        info!(cluster_url = %config.cluster_url, "Connecting to Kubernetes API");
        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;

        Ok(Self::from_client(client, options.timeout))
    }

    pub fn from_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn autoscalers(&self, namespace: &str) -> Api<HorizontalPodAutoscaler> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Run one API call under the configured timeout and classify its error
    async fn call<T, F>(&self, kind: ResourceKind, name: &str, fut: F) -> ClusterResult<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>> + Send,
    {
        debug!(kind = %kind, name = %name, "Orchestrator request");
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ClusterError::from_kube(err, kind, name)),
            Err(_) => Err(ClusterError::Timeout {
                kind,
                name: name.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

fn object_name(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get_namespace(&self, name: &str) -> ClusterResult<Namespace> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        self.call(ResourceKind::Namespace, name, api.get(name)).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> ClusterResult<Namespace> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let pp = PostParams::default();
        self.call(
            ResourceKind::Namespace,
            object_name(&namespace.metadata),
            api.create(&pp, namespace),
        )
        .await
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<Deployment> {
        let api = self.deployments(namespace);
        let pp = PostParams::default();
        self.call(
            ResourceKind::Deployment,
            object_name(&deployment.metadata),
            api.create(&pp, deployment),
        )
        .await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> ClusterResult<Deployment> {
        let api = self.deployments(namespace);
        self.call(ResourceKind::Deployment, name, api.get(name)).await
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<Deployment> {
        let api = self.deployments(namespace);
        let pp = PostParams::default();
        let name = object_name(&deployment.metadata);
        self.call(
            ResourceKind::Deployment,
            name,
            api.replace(name, &pp, deployment),
        )
        .await
    }

    async fn list_deployments(&self, namespace: &str) -> ClusterResult<Vec<Deployment>> {
        let api = self.deployments(namespace);
        let lp = ListParams::default();
        let list = self
            .call(ResourceKind::Deployment, namespace, api.list(&lp))
            .await?;
        Ok(list.items)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let api = self.deployments(namespace);
        let dp = DeleteParams::default();
        self.call(ResourceKind::Deployment, name, api.delete(name, &dp))
            .await
            .map(|_| ())
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> ClusterResult<Service> {
        let api = self.services(namespace);
        let pp = PostParams::default();
        self.call(
            ResourceKind::Service,
            object_name(&service.metadata),
            api.create(&pp, service),
        )
        .await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> ClusterResult<Service> {
        let api = self.services(namespace);
        self.call(ResourceKind::Service, name, api.get(name)).await
    }

    async fn list_services(&self, namespace: &str) -> ClusterResult<Vec<Service>> {
        let api = self.services(namespace);
        let lp = ListParams::default();
        let list = self
            .call(ResourceKind::Service, namespace, api.list(&lp))
            .await?;
        Ok(list.items)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let api = self.services(namespace);
        let dp = DeleteParams::default();
        self.call(ResourceKind::Service, name, api.delete(name, &dp))
            .await
            .map(|_| ())
    }

    async fn create_autoscaler(
        &self,
        namespace: &str,
        autoscaler: &HorizontalPodAutoscaler,
    ) -> ClusterResult<HorizontalPodAutoscaler> {
        let api = self.autoscalers(namespace);
        let pp = PostParams::default();
        self.call(
            ResourceKind::HorizontalPodAutoscaler,
            object_name(&autoscaler.metadata),
            api.create(&pp, autoscaler),
        )
        .await
    }

    async fn get_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<HorizontalPodAutoscaler> {
        let api = self.autoscalers(namespace);
        self.call(ResourceKind::HorizontalPodAutoscaler, name, api.get(name))
            .await
    }

    async fn delete_autoscaler(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let api = self.autoscalers(namespace);
        let dp = DeleteParams::default();
        self.call(
            ResourceKind::HorizontalPodAutoscaler,
            name,
            api.delete(name, &dp),
        )
        .await
        .map(|_| ())
    }

    async fn list_pods(&self, namespace: &str) -> ClusterResult<Vec<Pod>> {
        let api = self.pods(namespace);
        let lp = ListParams::default();
        let list = self.call(ResourceKind::Pod, namespace, api.list(&lp)).await?;
        Ok(list.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let api = self.pods(namespace);
        let dp = DeleteParams::default();
        self.call(ResourceKind::Pod, name, api.delete(name, &dp))
            .await
            .map(|_| ())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        tail_lines: Option<i64>,
    ) -> ClusterResult<String> {
        let api = self.pods(namespace);
        let params = LogParams {
            tail_lines,
            ..LogParams::default()
        };
        self.call(ResourceKind::Pod, name, api.logs(name, &params))
            .await
    }
}
