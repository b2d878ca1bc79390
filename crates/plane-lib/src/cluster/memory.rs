//! In-process [`ClusterApi`] implementation
//!
//! Mimics the parts of API-server behavior the control plane relies on:
//! namespaced storage, `resourceVersion` conflict detection on replace,
//! cluster IP assignment, and pods that follow a deployment's replica
//! count. Failures can be injected per (operation, kind).

use super::{async_trait, ClusterApi, ClusterResult};
use crate::error::ClusterError;
use crate::models::ResourceKind;
use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Pod, PodSpec, PodStatus, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Orchestrator operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterOp {
    Get,
    Create,
    Replace,
    List,
    Delete,
    Logs,
}

type Key = (String, String);

#[derive(Default)]
struct Store {
    namespaces: BTreeMap<String, Namespace>,
    deployments: BTreeMap<Key, Deployment>,
    services: BTreeMap<Key, Service>,
    autoscalers: BTreeMap<Key, HorizontalPodAutoscaler>,
    pods: BTreeMap<Key, Pod>,
    logs: HashMap<Key, String>,
    failures: HashMap<(ClusterOp, ResourceKind), (u16, String)>,
    version: u64,
    next_ip: u32,
    next_pod: u32,
}

impl Store {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn check(&self, op: ClusterOp, kind: ResourceKind, name: &str) -> ClusterResult<()> {
        match self.failures.get(&(op, kind)) {
            Some((code, message)) => Err(ClusterError::from_status(
                kind,
                name,
                *code,
                "Injected",
                message.clone(),
            )),
            None => Ok(()),
        }
    }

    fn require_namespace(&self, namespace: &str) -> ClusterResult<()> {
        if self.namespaces.contains_key(namespace) {
            Ok(())
        } else {
            Err(ClusterError::NotFound {
                kind: ResourceKind::Namespace,
                name: namespace.to_string(),
            })
        }
    }

    /// Stamp server-owned metadata on a newly created object
    fn admit(&mut self, meta: &mut ObjectMeta, namespace: Option<&str>) {
        meta.namespace = namespace.map(str::to_string);
        meta.resource_version = Some(self.next_version());
        meta.uid = Some(format!("uid-{}", self.version));
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = Some(Time(Utc::now()));
        }
    }

    /// Converge simulated pods and status onto the deployment's replicas
    fn reconcile_pods(&mut self, namespace: &str, name: &str) {
        let Some(deployment) = self.deployments.get(&key(namespace, name)).cloned() else {
            return;
        };
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1)
            .max(0) as usize;
        let owner = format!("{}-rs", name);

        let mut owned: Vec<Key> = self
            .pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && owned_by(pod, &owner))
            .map(|(k, _)| k.clone())
            .collect();

        while owned.len() > desired {
            if let Some(k) = owned.pop() {
                self.pods.remove(&k);
                self.logs.remove(&k);
            }
        }

        let template = deployment.spec.as_ref().map(|s| s.template.clone());
        while owned.len() < desired {
            self.next_pod += 1;
            self.next_ip += 1;
            let pod_name = format!("{}-{:05x}", owner, self.next_pod);
            let pod = Pod {
                metadata: ObjectMeta {
                    name: Some(pod_name.clone()),
                    namespace: Some(namespace.to_string()),
                    labels: template
                        .as_ref()
                        .and_then(|t| t.metadata.as_ref())
                        .and_then(|m| m.labels.clone()),
                    owner_references: Some(vec![OwnerReference {
                        api_version: "apps/v1".to_string(),
                        kind: "ReplicaSet".to_string(),
                        name: owner.clone(),
                        uid: format!("uid-{}", owner),
                        ..OwnerReference::default()
                    }]),
                    creation_timestamp: Some(Time(Utc::now())),
                    ..ObjectMeta::default()
                },
                spec: template.as_ref().and_then(|t| t.spec.clone()).map(|spec| PodSpec {
                    node_name: Some("memory-node".to_string()),
                    ..spec
                }),
                status: Some(PodStatus {
                    phase: Some("Running".to_string()),
                    pod_ip: Some(format!("10.244.{}.{}", self.next_ip / 250, self.next_ip % 250 + 2)),
                    start_time: Some(Time(Utc::now())),
                    ..PodStatus::default()
                }),
            };
            let k = key(namespace, &pod_name);
            self.pods.insert(k.clone(), pod);
            owned.push(k);
        }

        if let Some(stored) = self.deployments.get_mut(&key(namespace, name)) {
            let count = desired as i32;
            stored.status = Some(DeploymentStatus {
                replicas: Some(count),
                available_replicas: Some(count),
                ready_replicas: Some(count),
                updated_replicas: Some(count),
                conditions: Some(vec![DeploymentCondition {
                    type_: "Available".to_string(),
                    status: if count > 0 { "True" } else { "False" }.to_string(),
                    last_transition_time: Some(Time(Utc::now())),
                    reason: Some("MinimumReplicasAvailable".to_string()),
                    ..DeploymentCondition::default()
                }]),
                ..DeploymentStatus::default()
            });
        }
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn owned_by(pod: &Pod, owner: &str) -> bool {
    pod.metadata
        .owner_references
        .as_ref()
        .map(|refs| refs.iter().any(|r| r.name == owner))
        .unwrap_or(false)
}

fn name_of(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

fn not_found(kind: ResourceKind, name: &str) -> ClusterError {
    ClusterError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn already_exists(kind: ResourceKind, name: &str) -> ClusterError {
    ClusterError::AlreadyExists {
        kind,
        name: name.to_string(),
    }
}

fn in_namespace<T: Clone>(map: &BTreeMap<Key, T>, namespace: &str) -> Vec<T> {
    map.iter()
        .filter(|((ns, _), _)| ns == namespace)
        .map(|(_, v)| v.clone())
        .collect()
}

/// In-memory orchestrator
#[derive(Default)]
pub struct InMemoryCluster {
    store: Mutex<Store>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every `op` on `kind` fail with the given HTTP status
    pub fn fail_on(&self, op: ClusterOp, kind: ResourceKind, code: u16, message: impl Into<String>) {
        self.store().failures.insert((op, kind), (code, message.into()));
    }

    pub fn clear_failures(&self) {
        self.store().failures.clear();
    }

    /// Store a pod as-is, bypassing the simulated scheduler
    pub fn insert_pod(&self, namespace: &str, pod: Pod) {
        let mut store = self.store();
        let name = name_of(&pod.metadata);
        store.pods.insert(key(namespace, &name), pod);
    }

    /// Store a deployment as-is, keeping caller-supplied metadata
    pub fn insert_deployment(&self, namespace: &str, mut deployment: Deployment) {
        let mut store = self.store();
        let name = name_of(&deployment.metadata);
        if deployment.metadata.resource_version.is_none() {
            deployment.metadata.resource_version = Some(store.next_version());
        }
        store.deployments.insert(key(namespace, &name), deployment);
    }

    pub fn set_pod_logs(&self, namespace: &str, pod: &str, logs: impl Into<String>) {
        self.store().logs.insert(key(namespace, pod), logs.into());
    }

    /// Bump a deployment's `resourceVersion` as an outside writer would
    pub fn touch_deployment(&self, namespace: &str, name: &str) {
        let mut store = self.store();
        let version = store.next_version();
        if let Some(d) = store.deployments.get_mut(&key(namespace, name)) {
            d.metadata.resource_version = Some(version);
        }
    }

    pub fn namespace_exists(&self, name: &str) -> bool {
        self.store().namespaces.contains_key(name)
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn get_namespace(&self, name: &str) -> ClusterResult<Namespace> {
        let store = self.store();
        store.check(ClusterOp::Get, ResourceKind::Namespace, name)?;
        store
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Namespace, name))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> ClusterResult<Namespace> {
        let mut store = self.store();
        let name = name_of(&namespace.metadata);
        store.check(ClusterOp::Create, ResourceKind::Namespace, &name)?;
        if store.namespaces.contains_key(&name) {
            return Err(already_exists(ResourceKind::Namespace, &name));
        }
        let mut created = namespace.clone();
        store.admit(&mut created.metadata, None);
        store.namespaces.insert(name, created.clone());
        Ok(created)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<Deployment> {
        let mut store = self.store();
        let name = name_of(&deployment.metadata);
        store.check(ClusterOp::Create, ResourceKind::Deployment, &name)?;
        store.require_namespace(namespace)?;
        let k = key(namespace, &name);
        if store.deployments.contains_key(&k) {
            return Err(already_exists(ResourceKind::Deployment, &name));
        }
        let mut created = deployment.clone();
        store.admit(&mut created.metadata, Some(namespace));
        store.deployments.insert(k.clone(), created);
        store.reconcile_pods(namespace, &name);
        Ok(store.deployments[&k].clone())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> ClusterResult<Deployment> {
        let store = self.store();
        store.check(ClusterOp::Get, ResourceKind::Deployment, name)?;
        store
            .deployments
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Deployment, name))
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<Deployment> {
        let mut store = self.store();
        let name = name_of(&deployment.metadata);
        store.check(ClusterOp::Replace, ResourceKind::Deployment, &name)?;
        let k = key(namespace, &name);
        let current = store
            .deployments
            .get(&k)
            .ok_or_else(|| not_found(ResourceKind::Deployment, &name))?;

        if let Some(expected) = &deployment.metadata.resource_version {
            if current.metadata.resource_version.as_ref() != Some(expected) {
                return Err(ClusterError::Conflict {
                    kind: ResourceKind::Deployment,
                    name,
                    message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
                });
            }
        }

        let mut replaced = deployment.clone();
        replaced.metadata.creation_timestamp = current.metadata.creation_timestamp.clone();
        replaced.metadata.uid = current.metadata.uid.clone();
        replaced.metadata.namespace = Some(namespace.to_string());
        replaced.metadata.resource_version = Some(store.next_version());
        store.deployments.insert(k.clone(), replaced);
        store.reconcile_pods(namespace, &name);
        Ok(store.deployments[&k].clone())
    }

    async fn list_deployments(&self, namespace: &str) -> ClusterResult<Vec<Deployment>> {
        let store = self.store();
        store.check(ClusterOp::List, ResourceKind::Deployment, namespace)?;
        Ok(in_namespace(&store.deployments, namespace))
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut store = self.store();
        store.check(ClusterOp::Delete, ResourceKind::Deployment, name)?;
        store
            .deployments
            .remove(&key(namespace, name))
            .ok_or_else(|| not_found(ResourceKind::Deployment, name))?;

        // Cascade to the simulated replica set's pods
        let owner = format!("{}-rs", name);
        let orphaned: Vec<Key> = store
            .pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && owned_by(pod, &owner))
            .map(|(k, _)| k.clone())
            .collect();
        for k in orphaned {
            store.pods.remove(&k);
            store.logs.remove(&k);
        }
        Ok(())
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> ClusterResult<Service> {
        let mut store = self.store();
        let name = name_of(&service.metadata);
        store.check(ClusterOp::Create, ResourceKind::Service, &name)?;
        store.require_namespace(namespace)?;
        let k = key(namespace, &name);
        if store.services.contains_key(&k) {
            return Err(already_exists(ResourceKind::Service, &name));
        }
        let mut created = service.clone();
        store.admit(&mut created.metadata, Some(namespace));
        store.next_ip += 1;
        let ip = format!("10.96.{}.{}", store.next_ip / 250, store.next_ip % 250 + 2);
        if let Some(spec) = created.spec.as_mut() {
            spec.cluster_ip = Some(ip.clone());
            spec.cluster_ips = Some(vec![ip]);
        }
        store.services.insert(k, created.clone());
        Ok(created)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> ClusterResult<Service> {
        let store = self.store();
        store.check(ClusterOp::Get, ResourceKind::Service, name)?;
        store
            .services
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Service, name))
    }

    async fn list_services(&self, namespace: &str) -> ClusterResult<Vec<Service>> {
        let store = self.store();
        store.check(ClusterOp::List, ResourceKind::Service, namespace)?;
        Ok(in_namespace(&store.services, namespace))
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut store = self.store();
        store.check(ClusterOp::Delete, ResourceKind::Service, name)?;
        store
            .services
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::Service, name))
    }

    async fn create_autoscaler(
        &self,
        namespace: &str,
        autoscaler: &HorizontalPodAutoscaler,
    ) -> ClusterResult<HorizontalPodAutoscaler> {
        let mut store = self.store();
        let name = name_of(&autoscaler.metadata);
        store.check(ClusterOp::Create, ResourceKind::HorizontalPodAutoscaler, &name)?;
        store.require_namespace(namespace)?;
        let k = key(namespace, &name);
        if store.autoscalers.contains_key(&k) {
            return Err(already_exists(ResourceKind::HorizontalPodAutoscaler, &name));
        }
        let mut created = autoscaler.clone();
        store.admit(&mut created.metadata, Some(namespace));
        store.autoscalers.insert(k, created.clone());
        Ok(created)
    }

    async fn get_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<HorizontalPodAutoscaler> {
        let store = self.store();
        store.check(ClusterOp::Get, ResourceKind::HorizontalPodAutoscaler, name)?;
        store
            .autoscalers
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::HorizontalPodAutoscaler, name))
    }

    async fn delete_autoscaler(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut store = self.store();
        store.check(ClusterOp::Delete, ResourceKind::HorizontalPodAutoscaler, name)?;
        store
            .autoscalers
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::HorizontalPodAutoscaler, name))
    }

    async fn list_pods(&self, namespace: &str) -> ClusterResult<Vec<Pod>> {
        let store = self.store();
        store.check(ClusterOp::List, ResourceKind::Pod, namespace)?;
        Ok(in_namespace(&store.pods, namespace))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut store = self.store();
        store.check(ClusterOp::Delete, ResourceKind::Pod, name)?;
        let k = key(namespace, name);
        store.logs.remove(&k);
        store
            .pods
            .remove(&k)
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::Pod, name))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        tail_lines: Option<i64>,
    ) -> ClusterResult<String> {
        let store = self.store();
        store.check(ClusterOp::Logs, ResourceKind::Pod, name)?;
        let k = key(namespace, name);
        if !store.pods.contains_key(&k) {
            return Err(not_found(ResourceKind::Pod, name));
        }
        let logs = store.logs.get(&k).cloned().unwrap_or_default();
        Ok(match tail_lines {
            Some(n) if n >= 0 => {
                let lines: Vec<&str> = logs.lines().collect();
                let start = lines.len().saturating_sub(n as usize);
                lines[start..].join("\n")
            }
            _ => logs,
        })
    }
}
