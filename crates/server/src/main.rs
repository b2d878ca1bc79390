//! Model control plane
//!
//! Deploys uploaded ML models as workload/service/autoscaler groups on
//! Kubernetes and proxies inference requests to them.

use anyhow::Result;
use model_plane::{
    api,
    config::{OrchestratorKind, PlaneConfig},
};
use plane_lib::{
    health::{Component, HealthRegistry},
    ClusterApi, InMemoryCluster, KubeCluster, KubeClusterOptions, ModelStore, StructuredLogger,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PLANE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = PlaneConfig::load()?;
    info!(
        namespace = %config.namespace,
        base_path = %config.base_path,
        orchestrator = config.orchestrator.as_str(),
        "Control plane configured"
    );

    let health_registry = HealthRegistry::with_all_components().await;

    let cluster: Arc<dyn ClusterApi> = match config.orchestrator {
        OrchestratorKind::Kube => Arc::new(
            KubeCluster::connect(&KubeClusterOptions {
                kubeconfig: config.kubeconfig.clone(),
                timeout: config.orchestrator_timeout(),
            })
            .await?,
        ),
        OrchestratorKind::Memory => {
            warn!("Using in-memory orchestrator; nothing is deployed to a cluster");
            Arc::new(InMemoryCluster::new())
        }
    };

    if !api::check_orchestrator(cluster.as_ref(), &config.namespace, &health_registry).await {
        warn!("Orchestrator not reachable at startup");
    }

    if let Err(err) = ModelStore::new(config.upload_dir.clone()).prepare().await {
        warn!(error = %err, dir = %config.upload_dir.display(), "Upload directory unavailable");
        health_registry
            .mark_degraded(Component::ModelStore, err.to_string())
            .await;
    }

    let logger = StructuredLogger::new(config.namespace.clone());
    logger.log_startup(PLANE_VERSION, config.orchestrator.as_str());

    let checks = config.health_check_interval().map(|every| {
        api::spawn_orchestrator_checks(
            cluster.clone(),
            config.namespace.clone(),
            health_registry.clone(),
            every,
        )
    });

    let state = Arc::new(api::AppState::new(
        cluster,
        &config,
        health_registry.clone(),
    )?);
    let router = api::create_router(state, &config.base_path, config.max_upload_bytes);

    health_registry.mark_started().await;

    api::serve(config.api_port, router, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    if let Some(checks) = checks {
        checks.abort();
    }
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
