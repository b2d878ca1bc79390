//! Idempotent namespace provisioning

use crate::cluster::{ClusterApi, ClusterResult};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info};

/// Create `name` unless it already exists.
///
/// Losing a create race to another caller counts as success.
pub async fn ensure_namespace(cluster: &dyn ClusterApi, name: &str) -> ClusterResult<()> {
    match cluster.get_namespace(name).await {
        Ok(_) => {
            debug!(namespace = %name, "Namespace already present");
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            let namespace = Namespace {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..ObjectMeta::default()
                },
                ..Namespace::default()
            };
            match cluster.create_namespace(&namespace).await {
                Ok(_) => {
                    info!(namespace = %name, "Created namespace");
                    Ok(())
                }
                Err(err) if err.is_already_exists() => Ok(()),
                Err(err) => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterOp, InMemoryCluster};
    use crate::error::ClusterError;
    use crate::models::ResourceKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_creates_missing_namespace() {
        let cluster = InMemoryCluster::new();
        ensure_namespace(&cluster, "model-deployments").await.unwrap();
        assert!(cluster.namespace_exists("model-deployments"));
    }

    #[tokio::test]
    async fn test_existing_namespace_is_left_alone() {
        let cluster = InMemoryCluster::new();
        ensure_namespace(&cluster, "ns").await.unwrap();
        // A second create would fail, so success proves no create happened.
        cluster.fail_on(ClusterOp::Create, ResourceKind::Namespace, 500, "should not be called");
        ensure_namespace(&cluster, "ns").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_ensure_does_not_fail() {
        let cluster = Arc::new(InMemoryCluster::new());
        let a = {
            let cluster = cluster.clone();
            tokio::spawn(async move { ensure_namespace(cluster.as_ref(), "ns").await })
        };
        let b = {
            let cluster = cluster.clone();
            tokio::spawn(async move { ensure_namespace(cluster.as_ref(), "ns").await })
        };
        assert!(a.await.unwrap().is_ok());
        assert!(b.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_already_exists_on_create_is_success() {
        let cluster = InMemoryCluster::new();
        ensure_namespace(&cluster, "ns").await.unwrap();
        // Another caller created it between our read and our create.
        cluster.fail_on(ClusterOp::Get, ResourceKind::Namespace, 404, "not found");
        ensure_namespace(&cluster, "ns").await.unwrap();
    }

    #[tokio::test]
    async fn test_other_read_errors_propagate() {
        let cluster = InMemoryCluster::new();
        cluster.fail_on(ClusterOp::Get, ResourceKind::Namespace, 403, "forbidden");
        let err = ensure_namespace(&cluster, "ns").await.unwrap_err();
        assert!(matches!(err, ClusterError::Rejected { code: 403, .. }));
        assert!(!cluster.namespace_exists("ns"));
    }
}
