//! Control-plane configuration

use anyhow::{Context, Result};
use plane_lib::WorkloadSettings;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Which orchestrator backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorKind {
    /// Kubernetes API server via in-cluster config or kubeconfig
    Kube,
    /// In-process stand-in for local development
    Memory,
}

impl OrchestratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorKind::Kube => "kube",
            OrchestratorKind::Memory => "memory",
        }
    }
}

/// Control-plane configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlaneConfig {
    /// HTTP listen port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Prefix of the control-plane REST routes
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Namespace holding every model group
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_image")]
    pub default_image: String,

    #[serde(default = "default_port")]
    pub container_port: i32,

    #[serde(default = "default_port")]
    pub target_port: i32,

    /// Mount path of the shared volume inside model containers
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_shared_pvc")]
    pub shared_pvc: String,

    /// Local directory uploads are written to
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_orchestrator")]
    pub orchestrator: OrchestratorKind,

    /// Explicit kubeconfig; in-cluster or default kubeconfig otherwise
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub orchestrator_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub inference_timeout_secs: u64,

    #[serde(default = "default_pod_log_tail_lines")]
    pub pod_log_tail_lines: i64,

    /// Period of the background orchestrator check; 0 disables it
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
}

fn default_api_port() -> u16 {
    8080
}

fn default_base_path() -> String {
    "/api/ControlPlane".to_string()
}

fn default_namespace() -> String {
    "model-deployments".to_string()
}

fn default_image() -> String {
    "leemme/ml-pythonenv:latest".to_string()
}

fn default_port() -> i32 {
    8000
}

fn default_model_dir() -> String {
    "/app/models".to_string()
}

fn default_shared_pvc() -> String {
    "shared-pvc".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("/app/shared-models")
}

fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}

fn default_orchestrator() -> OrchestratorKind {
    OrchestratorKind::Kube
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_pod_log_tail_lines() -> i64 {
    200
}

fn default_health_check_interval_secs() -> u64 {
    30
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            base_path: default_base_path(),
            namespace: default_namespace(),
            default_image: default_image(),
            container_port: default_port(),
            target_port: default_port(),
            model_dir: default_model_dir(),
            shared_pvc: default_shared_pvc(),
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            orchestrator: default_orchestrator(),
            kubeconfig: None,
            orchestrator_timeout_secs: default_timeout_secs(),
            inference_timeout_secs: default_timeout_secs(),
            pod_log_tail_lines: default_pod_log_tail_lines(),
            health_check_interval_secs: default_health_check_interval_secs(),
        }
    }
}

impl PlaneConfig {
    /// Load configuration from `MODEL_PLANE_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder().add_source(config::Environment::with_prefix("MODEL_PLANE")),
        )
    }

    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder.build()?;
        let mut parsed: PlaneConfig = config
            .try_deserialize()
            .context("Invalid control-plane configuration")?;
        parsed.base_path = normalize_base_path(&parsed.base_path);
        Ok(parsed)
    }

    pub fn workload_settings(&self) -> WorkloadSettings {
        WorkloadSettings {
            model_dir: self.model_dir.clone(),
            shared_pvc: self.shared_pvc.clone(),
        }
    }

    pub fn orchestrator_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator_timeout_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Option<Duration> {
        (self.health_check_interval_secs > 0)
            .then(|| Duration::from_secs(self.health_check_interval_secs))
    }

    /// Tail limit for pod logs; negative disables it
    pub fn log_tail(&self) -> Option<i64> {
        (self.pod_log_tail_lines >= 0).then_some(self.pod_log_tail_lines)
    }
}

/// Leading slash, no trailing slash
fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}
