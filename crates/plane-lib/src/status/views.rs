//! Read-side records returned by status listings

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, Pod, Service, Volume};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionView {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_transition_time: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortView {
    pub name: Option<String>,
    pub port: i32,
    pub protocol: Option<String>,
    /// Service target port, as number or named port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub name: String,
    pub image: Option<String>,
    pub image_pull_policy: Option<String>,
    pub ports: Vec<PortView>,
    pub env: BTreeMap<String, String>,
    pub resources: BTreeMap<String, BTreeMap<String, String>>,
    pub volume_mounts: Vec<VolumeMountView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMountView {
    pub name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeView {
    pub name: String,
    pub volume_type: String,
    pub claim_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerView {
    pub kind: String,
    pub name: String,
}

/// Companion service of a group; `error` is set when it could not be read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub name: String,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: Option<String>,
    pub service_type: Option<String>,
    pub ports: Vec<PortView>,
    pub selector: BTreeMap<String, String>,
    pub error: Option<String>,
}

/// Observed state of one group's workload and service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatus {
    pub name: String,
    pub deployment: String,
    pub namespace: String,
    pub replicas: Option<i32>,
    pub available_replicas: Option<i32>,
    pub ready_replicas: Option<i32>,
    pub creation_timestamp: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
    pub strategy: Option<String>,
    pub min_ready_seconds: Option<i32>,
    pub revision_history_limit: Option<i32>,
    pub conditions: Vec<ConditionView>,
    pub containers: Vec<ContainerView>,
    pub volumes: Vec<VolumeView>,
    pub owner_references: Vec<OwnerView>,
    pub service: ServiceView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodView {
    pub name: String,
    pub namespace: Option<String>,
    pub phase: Option<String>,
    pub pod_ip: Option<String>,
    pub node_name: Option<String>,
    pub start_time: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerView>,
    pub owner_references: Vec<OwnerView>,
}

/// A pod joined with the services that select it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodWithServices {
    #[serde(flatten)]
    pub pod: PodView,
    pub services: Vec<ServiceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_error: Option<String>,
}

fn container_view(c: &Container) -> ContainerView {
    let ports = c
        .ports
        .iter()
        .flatten()
        .map(|p| PortView {
            name: p.name.clone(),
            port: p.container_port,
            protocol: p.protocol.clone(),
            target_port: None,
        })
        .collect();

    let env = c
        .env
        .iter()
        .flatten()
        .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
        .collect();

    let mut resources = BTreeMap::new();
    if let Some(req) = &c.resources {
        for (section, values) in [("limits", &req.limits), ("requests", &req.requests)] {
            if let Some(values) = values {
                let rendered = values
                    .iter()
                    .map(|(k, q)| (k.clone(), q.0.clone()))
                    .collect();
                resources.insert(section.to_string(), rendered);
            }
        }
    }

    let volume_mounts = c
        .volume_mounts
        .iter()
        .flatten()
        .map(|m| VolumeMountView {
            name: m.name.clone(),
            mount_path: m.mount_path.clone(),
        })
        .collect();

    ContainerView {
        name: c.name.clone(),
        image: c.image.clone(),
        image_pull_policy: c.image_pull_policy.clone(),
        ports,
        env,
        resources,
        volume_mounts,
    }
}

fn volume_view(v: &Volume) -> VolumeView {
    let (volume_type, claim_name) = if let Some(pvc) = &v.persistent_volume_claim {
        ("persistentVolumeClaim", Some(pvc.claim_name.clone()))
    } else if v.config_map.is_some() {
        ("configMap", None)
    } else if v.secret.is_some() {
        ("secret", None)
    } else if v.empty_dir.is_some() {
        ("emptyDir", None)
    } else if v.host_path.is_some() {
        ("hostPath", None)
    } else {
        ("other", None)
    };
    VolumeView {
        name: v.name.clone(),
        volume_type: volume_type.to_string(),
        claim_name,
    }
}

fn owners(
    refs: &Option<Vec<k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference>>,
) -> Vec<OwnerView> {
    refs.iter()
        .flatten()
        .map(|o| OwnerView {
            kind: o.kind.clone(),
            name: o.name.clone(),
        })
        .collect()
}

impl ServiceView {
    pub fn from_service(service: &Service) -> Self {
        let spec = service.spec.as_ref();
        let ports = spec
            .and_then(|s| s.ports.as_ref())
            .into_iter()
            .flatten()
            .map(|p| PortView {
                name: p.name.clone(),
                port: p.port,
                protocol: p.protocol.clone(),
                target_port: p.target_port.as_ref().map(|t| match t {
                    k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(n) => {
                        n.to_string()
                    }
                    k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::String(s) => {
                        s.clone()
                    }
                }),
            })
            .collect();

        Self {
            name: service.metadata.name.clone().unwrap_or_default(),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
            service_type: spec.and_then(|s| s.type_.clone()),
            ports,
            selector: spec.and_then(|s| s.selector.clone()).unwrap_or_default(),
            error: None,
        }
    }

    /// Placeholder for a service that could not be read
    pub fn unavailable(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl GroupStatus {
    pub fn from_deployment(
        canonical: &str,
        deployment: &Deployment,
        namespace: &str,
        service: ServiceView,
    ) -> Self {
        let meta = &deployment.metadata;
        let spec = deployment.spec.as_ref();
        let status = deployment.status.as_ref();
        let pod_spec = spec.and_then(|s| s.template.spec.as_ref());

        let conditions = status
            .and_then(|s| s.conditions.as_ref())
            .into_iter()
            .flatten()
            .map(|c| ConditionView {
                type_: c.type_.clone(),
                status: c.status.clone(),
                last_transition_time: c.last_transition_time.as_ref().map(|t| t.0.to_rfc3339()),
                reason: c.reason.clone(),
                message: c.message.clone(),
            })
            .collect();

        Self {
            name: canonical.to_string(),
            deployment: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_else(|| namespace.to_string()),
            replicas: spec.and_then(|s| s.replicas),
            available_replicas: status.and_then(|s| s.available_replicas),
            ready_replicas: status.and_then(|s| s.ready_replicas),
            creation_timestamp: meta.creation_timestamp.as_ref().map(|t| t.0.to_rfc3339()),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            selector: spec
                .and_then(|s| s.selector.match_labels.clone())
                .unwrap_or_default(),
            strategy: spec
                .and_then(|s| s.strategy.as_ref())
                .and_then(|s| s.type_.clone()),
            min_ready_seconds: spec.and_then(|s| s.min_ready_seconds),
            revision_history_limit: spec.and_then(|s| s.revision_history_limit),
            conditions,
            containers: pod_spec
                .map(|p| p.containers.iter().map(container_view).collect())
                .unwrap_or_default(),
            volumes: pod_spec
                .and_then(|p| p.volumes.as_ref())
                .map(|v| v.iter().map(volume_view).collect())
                .unwrap_or_default(),
            owner_references: owners(&meta.owner_references),
            service,
        }
    }
}

impl PodView {
    pub fn from_pod(pod: &Pod) -> Self {
        let meta = &pod.metadata;
        let status = pod.status.as_ref();
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
            phase: status.and_then(|s| s.phase.clone()),
            pod_ip: status.and_then(|s| s.pod_ip.clone()),
            node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            start_time: status
                .and_then(|s| s.start_time.as_ref())
                .map(|t| t.0.to_rfc3339()),
            labels: meta.labels.clone().unwrap_or_default(),
            containers: pod
                .spec
                .as_ref()
                .map(|s| s.containers.iter().map(container_view).collect())
                .unwrap_or_default(),
            owner_references: owners(&meta.owner_references),
        }
    }
}
