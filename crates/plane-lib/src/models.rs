//! Core data models shared by the group manager, scaler and API layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator resource kinds managed or observed by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResourceKind {
    Namespace,
    Deployment,
    Service,
    HorizontalPodAutoscaler,
    Pod,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
            ResourceKind::Pod => "Pod",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named orchestrator resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A resource that could not be deleted, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDeletion {
    #[serde(flatten)]
    pub resource: ResourceRef,
    pub reason: String,
    /// True when the resource simply did not exist
    pub not_found: bool,
}

/// Structured result of a group teardown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    #[serde(rename = "Deleted")]
    pub deleted: Vec<ResourceRef>,
    #[serde(rename = "FailedToDelete")]
    pub failed_to_delete: Vec<FailedDeletion>,
}

impl DeleteOutcome {
    /// Kinds that were deleted at least once
    pub fn deleted_kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = Vec::new();
        for r in &self.deleted {
            if !kinds.contains(&r.kind) {
                kinds.push(r.kind);
            }
        }
        kinds
    }

    /// Kinds with at least one failed deletion
    pub fn failed_kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = Vec::new();
        for f in &self.failed_to_delete {
            if !kinds.contains(&f.resource.kind) {
                kinds.push(f.resource.kind);
            }
        }
        kinds
    }

    pub fn is_complete(&self) -> bool {
        self.failed_to_delete.is_empty()
    }
}

/// Everything needed to create one model deployment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTemplate {
    pub model_name: String,
    pub image: String,
    pub container_port: i32,
    pub target_port: i32,
}

/// Cluster-wide settings applied to every workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSettings {
    /// Directory inside the container where models are mounted
    pub model_dir: String,
    /// Pre-existing claim backing the shared model volume
    pub shared_pvc: String,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            model_dir: "/app/models".to_string(),
            shared_pvc: "shared-pvc".to_string(),
        }
    }
}

/// Successful group creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCreated {
    pub name: String,
    pub namespace: String,
    pub deployment: String,
    pub service: String,
    pub autoscaler: String,
    pub message: String,
}

/// Direction of a relative scaling step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    Up,
    Down,
}

impl fmt::Display for StepDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepDirection::Up => write!(f, "up"),
            StepDirection::Down => write!(f, "down"),
        }
    }
}

/// Result of a scaling operation
///
/// A rejection is a normal outcome, not an error: the workload is left
/// untouched and the caller is told why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScaleOutcome {
    Scaled {
        deployment: String,
        from: i32,
        to: i32,
    },
    Unchanged {
        deployment: String,
        replicas: i32,
    },
    Rejected {
        deployment: String,
        replicas: i32,
        reason: String,
    },
}

impl ScaleOutcome {
    /// Replica count the workload has after the operation
    pub fn replicas(&self) -> i32 {
        match self {
            ScaleOutcome::Scaled { to, .. } => *to,
            ScaleOutcome::Unchanged { replicas, .. } => *replicas,
            ScaleOutcome::Rejected { replicas, .. } => *replicas,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ScaleOutcome::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_outcome_uses_legacy_field_names() {
        let outcome = DeleteOutcome {
            deleted: vec![ResourceRef::new(ResourceKind::Service, "python-service-a")],
            failed_to_delete: vec![FailedDeletion {
                resource: ResourceRef::new(ResourceKind::HorizontalPodAutoscaler, "a-hpa"),
                reason: "not found".to_string(),
                not_found: true,
            }],
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["Deleted"][0]["kind"], "Service");
        assert_eq!(json["FailedToDelete"][0]["kind"], "HorizontalPodAutoscaler");
        assert_eq!(json["FailedToDelete"][0]["name"], "a-hpa");
        assert_eq!(json["FailedToDelete"][0]["notFound"], true);
    }

    #[test]
    fn test_scale_outcome_is_tagged() {
        let outcome = ScaleOutcome::Rejected {
            deployment: "a-deployment".to_string(),
            replicas: 1,
            reason: "cannot scale below 1".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(outcome.replicas(), 1);
        assert!(outcome.is_rejected());
    }

    #[test]
    fn test_resource_ref_display() {
        let r = ResourceRef::new(ResourceKind::Deployment, "a-deployment");
        assert_eq!(r.to_string(), "Deployment/a-deployment");
    }
}
