//! Liveness and readiness state of the control plane
//!
//! The server tracks two dependencies: the orchestrator API and the
//! upload directory shared with model workloads. `/healthz` reports the
//! worst of them; `/readyz` additionally waits for startup to finish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A dependency whose health is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Kubernetes API, or the in-memory stand-in
    Orchestrator,
    /// Upload directory backing the shared model volume
    ModelStore,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Orchestrator, Component::ModelStore];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Orchestrator => "orchestrator",
            Component::ModelStore => "model_store",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, with reduced function (e.g. uploads failing)
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, detail: Option<String>) -> Self {
        Self {
            status,
            detail,
            checked_at: Utc::now(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    components: BTreeMap<Component, ComponentHealth>,
    started: bool,
}

/// Shared, cloneable view of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every [`Component`] registered as healthy
    pub async fn with_all_components() -> Self {
        let registry = Self::new();
        for component in Component::ALL {
            registry.mark_healthy(component).await;
        }
        registry
    }

    async fn record(&self, component: Component, status: ComponentStatus, detail: Option<String>) {
        let mut state = self.state.write().await;
        state
            .components
            .insert(component, ComponentHealth::new(status, detail));
    }

    pub async fn mark_healthy(&self, component: Component) {
        self.record(component, ComponentStatus::Healthy, None).await;
    }

    pub async fn mark_degraded(&self, component: Component, detail: impl Into<String>) {
        self.record(component, ComponentStatus::Degraded, Some(detail.into()))
            .await;
    }

    pub async fn mark_unhealthy(&self, component: Component, detail: impl Into<String>) {
        self.record(component, ComponentStatus::Unhealthy, Some(detail.into()))
            .await;
    }

    /// Flip readiness on once the router is about to serve
    pub async fn mark_started(&self) {
        self.state.write().await.started = true;
    }

    pub async fn report(&self) -> HealthReport {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthReport {
            status,
            components: state.components.clone(),
        }
    }

    pub async fn readiness(&self) -> Readiness {
        let state = self.state.read().await;
        if !state.started {
            return Readiness {
                ready: false,
                reason: Some("Control plane not yet initialized".to_string()),
            };
        }

        let down = state
            .components
            .iter()
            .find(|(_, health)| !health.status.is_operational());
        match down {
            Some((component, health)) => Readiness {
                ready: false,
                reason: Some(match &health.detail {
                    Some(detail) => format!("Component '{}' unhealthy: {}", component, detail),
                    None => format!("Component '{}' unhealthy", component),
                }),
            },
            None => Readiness {
                ready: true,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let report = HealthRegistry::new().report().await;
        assert_eq!(report.status, ComponentStatus::Healthy);
        assert!(report.components.is_empty());
    }

    #[tokio::test]
    async fn test_report_serializes_component_keys() {
        let registry = HealthRegistry::with_all_components().await;
        let json = serde_json::to_value(registry.report().await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"]["orchestrator"]["status"], "healthy");
        assert!(json["components"]["model_store"]["checkedAt"].is_string());
    }

    #[tokio::test]
    async fn test_degraded_store_degrades_overall() {
        let registry = HealthRegistry::with_all_components().await;
        registry
            .mark_degraded(Component::ModelStore, "upload directory not writable")
            .await;

        let report = registry.report().await;
        assert_eq!(report.status, ComponentStatus::Degraded);
        assert!(report.status.is_operational());
        assert_eq!(
            report.components[&Component::ModelStore].detail.as_deref(),
            Some("upload directory not writable")
        );
    }

    #[tokio::test]
    async fn test_unhealthy_orchestrator_blocks_readiness() {
        let registry = HealthRegistry::with_all_components().await;
        registry.mark_started().await;
        registry
            .mark_unhealthy(Component::Orchestrator, "connection refused")
            .await;
        registry
            .mark_degraded(Component::ModelStore, "read-only")
            .await;

        assert_eq!(registry.report().await.status, ComponentStatus::Unhealthy);
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Component 'orchestrator' unhealthy: connection refused")
        );
    }

    #[tokio::test]
    async fn test_not_ready_until_started() {
        let registry = HealthRegistry::with_all_components().await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Control plane not yet initialized")
        );

        registry.mark_started().await;
        assert!(registry.readiness().await.ready);

        // Recovery clears the block
        registry.mark_unhealthy(Component::Orchestrator, "down").await;
        assert!(!registry.readiness().await.ready);
        registry.mark_healthy(Component::Orchestrator).await;
        assert!(registry.readiness().await.ready);
    }
}
