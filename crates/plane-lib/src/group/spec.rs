//! Manifests for the three members of a model group

use crate::models::{GroupTemplate, WorkloadSettings};
use crate::naming::GroupNames;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ResourceMetricSource,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub const SHARED_VOLUME: &str = "shared-volume";
pub const INITIAL_REPLICAS: i32 = 1;
pub const AUTOSCALER_MIN_REPLICAS: i32 = 1;
pub const AUTOSCALER_MAX_REPLICAS: i32 = 10;
pub const AUTOSCALER_CPU_UTILIZATION: i32 = 50;
pub const SERVICE_PORT: i32 = 80;
pub const SERVICE_TYPE: &str = "LoadBalancer";

fn meta(name: &str, namespace: &str, names: &GroupNames) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(names.selector()),
        ..ObjectMeta::default()
    }
}

/// Workload running the model-serving container
pub fn workload(
    names: &GroupNames,
    template: &GroupTemplate,
    settings: &WorkloadSettings,
    namespace: &str,
) -> Deployment {
    let container = Container {
        name: names.container.clone(),
        image: Some(template.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            container_port: template.container_port,
            ..ContainerPort::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: SHARED_VOLUME.to_string(),
            mount_path: settings.model_dir.clone(),
            ..VolumeMount::default()
        }]),
        env: Some(vec![
            EnvVar {
                name: "MODEL_NAME".to_string(),
                value: Some(names.canonical.clone()),
                ..EnvVar::default()
            },
            EnvVar {
                name: "MODEL_DIR".to_string(),
                value: Some(settings.model_dir.clone()),
                ..EnvVar::default()
            },
        ]),
        ..Container::default()
    };

    Deployment {
        metadata: meta(&names.deployment, namespace, names),
        spec: Some(DeploymentSpec {
            replicas: Some(INITIAL_REPLICAS),
            selector: LabelSelector {
                match_labels: Some(names.selector()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(names.selector()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: SHARED_VOLUME.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: settings.shared_pvc.clone(),
                            ..PersistentVolumeClaimVolumeSource::default()
                        }),
                        ..Volume::default()
                    }]),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// Autoscaler bound to the group's workload by name
pub fn autoscaler(names: &GroupNames, namespace: &str) -> HorizontalPodAutoscaler {
    HorizontalPodAutoscaler {
        metadata: meta(&names.autoscaler, namespace, names),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: names.deployment.clone(),
            },
            min_replicas: Some(AUTOSCALER_MIN_REPLICAS),
            max_replicas: AUTOSCALER_MAX_REPLICAS,
            metrics: Some(vec![MetricSpec {
                type_: "Resource".to_string(),
                resource: Some(ResourceMetricSource {
                    name: "cpu".to_string(),
                    target: MetricTarget {
                        type_: "Utilization".to_string(),
                        average_utilization: Some(AUTOSCALER_CPU_UTILIZATION),
                        ..MetricTarget::default()
                    },
                }),
                ..MetricSpec::default()
            }]),
            ..HorizontalPodAutoscalerSpec::default()
        }),
        ..HorizontalPodAutoscaler::default()
    }
}

/// Externally reachable service in front of the workload's pods
pub fn service(names: &GroupNames, template: &GroupTemplate, namespace: &str) -> Service {
    Service {
        metadata: meta(&names.service, namespace, names),
        spec: Some(ServiceSpec {
            selector: Some(names.selector()),
            ports: Some(vec![ServicePort {
                protocol: Some("TCP".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(template.target_port)),
                ..ServicePort::default()
            }]),
            type_: Some(SERVICE_TYPE.to_string()),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
