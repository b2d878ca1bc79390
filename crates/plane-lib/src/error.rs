//! Error types for control-plane operations

use crate::models::{FailedDeletion, ResourceKind, ResourceRef};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a single orchestrator API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The resource does not exist
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    /// A create raced with an existing resource of the same name
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// An update lost an optimistic-concurrency race
    #[error("conflicting update to {kind} '{name}': {message}")]
    Conflict {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    /// The orchestrator refused the request
    #[error("orchestrator rejected {kind} '{name}' ({code}): {message}")]
    Rejected {
        kind: ResourceKind,
        name: String,
        code: u16,
        message: String,
    },

    #[error("request for {kind} '{name}' timed out after {timeout:?}")]
    Timeout {
        kind: ResourceKind,
        name: String,
        timeout: Duration,
    },

    #[error("request for {kind} '{name}' failed: {message}")]
    Transport {
        kind: ResourceKind,
        name: String,
        message: String,
    },
}

impl ClusterError {
    /// Classify an orchestrator status response
    pub fn from_status(
        kind: ResourceKind,
        name: &str,
        code: u16,
        reason: &str,
        message: impl Into<String>,
    ) -> Self {
        let name = name.to_string();
        match code {
            404 => ClusterError::NotFound { kind, name },
            409 if reason == "AlreadyExists" => ClusterError::AlreadyExists { kind, name },
            409 => ClusterError::Conflict {
                kind,
                name,
                message: message.into(),
            },
            code => ClusterError::Rejected {
                kind,
                name,
                code,
                message: message.into(),
            },
        }
    }

    /// Map a kube client error onto the control-plane taxonomy
    pub fn from_kube(err: kube::Error, kind: ResourceKind, name: &str) -> Self {
        match err {
            kube::Error::Api(resp) => {
                Self::from_status(kind, name, resp.code, &resp.reason, resp.message)
            }
            other => ClusterError::Transport {
                kind,
                name: name.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }

    /// The orchestrator did not answer, or answered with a server error
    pub fn is_unavailable(&self) -> bool {
        match self {
            ClusterError::Timeout { .. } | ClusterError::Transport { .. } => true,
            ClusterError::Rejected { code, .. } => *code >= 500,
            _ => false,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ClusterError::NotFound { kind, .. }
            | ClusterError::AlreadyExists { kind, .. }
            | ClusterError::Conflict { kind, .. }
            | ClusterError::Rejected { kind, .. }
            | ClusterError::Timeout { kind, .. }
            | ClusterError::Transport { kind, .. } => *kind,
        }
    }
}

/// Stage of group creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateStage {
    Namespace,
    Workload,
    Autoscaler,
    Service,
}

impl fmt::Display for CreateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateStage::Namespace => write!(f, "namespace"),
            CreateStage::Workload => write!(f, "workload"),
            CreateStage::Autoscaler => write!(f, "autoscaler"),
            CreateStage::Service => write!(f, "service"),
        }
    }
}

/// A group creation that stopped part-way
///
/// Children created earlier in the same call have been compensated;
/// `rolled_back` and `rollback_failures` report how that went.
#[derive(Debug, Clone, Error)]
#[error("failed to create {stage} for group '{group}': {source}")]
pub struct CreateGroupError {
    pub group: String,
    pub stage: CreateStage,
    pub source: ClusterError,
    pub rolled_back: Vec<ResourceRef>,
    pub rollback_failures: Vec<FailedDeletion>,
}

/// Failure of a proxied inference call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProxyError {
    #[error("inference request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("inference request to {url} timed out")]
    Timeout { url: String },

    #[error("inference endpoint returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("inference endpoint returned an unexpected response ({status}): {reason}")]
    MalformedResponse {
        status: u16,
        body: String,
        reason: String,
    },
}

impl ProxyError {
    /// Upstream HTTP status, when a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ProxyError::UpstreamStatus { status, .. } => Some(*status),
            ProxyError::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Upstream response body, when a response was received
    pub fn body(&self) -> Option<&str> {
        match self {
            ProxyError::UpstreamStatus { body, .. } => Some(body),
            ProxyError::MalformedResponse { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Main error type for control-plane operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid caller input, detected before any orchestrator call
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    CreateGroup(#[from] Box<CreateGroupError>),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("model store error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Orchestrator failure behind this error, if it came from one
    pub fn cluster_error(&self) -> Option<&ClusterError> {
        match self {
            Error::Cluster(err) => Some(err),
            Error::CreateGroup(err) => Some(&err.source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_404_is_not_found() {
        let err = ClusterError::from_status(ResourceKind::Service, "svc", 404, "NotFound", "x");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ResourceKind::Service);
        assert_eq!(err.to_string(), "Service 'svc' not found");
    }

    #[test]
    fn test_status_409_splits_on_reason() {
        let exists = ClusterError::from_status(
            ResourceKind::Namespace,
            "ns",
            409,
            "AlreadyExists",
            "namespaces \"ns\" already exists",
        );
        assert!(exists.is_already_exists());

        let conflict = ClusterError::from_status(
            ResourceKind::Deployment,
            "d",
            409,
            "Conflict",
            "the object has been modified",
        );
        assert!(matches!(conflict, ClusterError::Conflict { .. }));
    }

    #[test]
    fn test_other_status_is_rejection_with_message() {
        let err = ClusterError::from_status(
            ResourceKind::Deployment,
            "d",
            422,
            "Invalid",
            "spec.template.spec.containers[0].image: Required value",
        );
        match &err {
            ClusterError::Rejected { code, message, .. } => {
                assert_eq!(*code, 422);
                assert!(message.contains("Required value"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn test_unavailable_covers_transport_and_server_errors() {
        let transport = ClusterError::Transport {
            kind: ResourceKind::Namespace,
            name: "ns".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(transport.is_unavailable());
        let server = ClusterError::from_status(ResourceKind::Pod, "p", 503, "Unavailable", "x");
        assert!(server.is_unavailable());

        let missing = ClusterError::from_status(ResourceKind::Pod, "p", 404, "NotFound", "x");
        assert!(!missing.is_unavailable());
        let forbidden = ClusterError::from_status(ResourceKind::Pod, "p", 403, "Forbidden", "x");
        assert!(!forbidden.is_unavailable());

        let err = Error::from(missing);
        assert!(err.cluster_error().is_some_and(|e| e.is_not_found()));
        assert!(Error::validation("bad").cluster_error().is_none());
    }

    #[test]
    fn test_create_group_error_names_stage() {
        let err = CreateGroupError {
            group: "fraud-model".to_string(),
            stage: CreateStage::Autoscaler,
            source: ClusterError::from_status(
                ResourceKind::HorizontalPodAutoscaler,
                "fraud-model-hpa",
                403,
                "Forbidden",
                "forbidden",
            ),
            rolled_back: vec![],
            rollback_failures: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("autoscaler"));
        assert!(msg.contains("fraud-model"));
        assert!(msg.contains("forbidden"));
    }

    #[test]
    fn test_proxy_error_carries_status_and_body() {
        let err = ProxyError::UpstreamStatus {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.body(), Some("boom"));

        let err = ProxyError::Timeout {
            url: "http://x/predict/".to_string(),
        };
        assert_eq!(err.status(), None);
    }
}
