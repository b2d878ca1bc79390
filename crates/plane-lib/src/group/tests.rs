//! Lifecycle tests for model deployment groups
//!
//! Run against the in-memory orchestrator with injected failures.

use super::*;
use crate::cluster::{ClusterOp, InMemoryCluster};
use crate::error::Error;

const NS: &str = "model-deployments";

fn template(model: &str) -> GroupTemplate {
    GroupTemplate {
        model_name: model.to_string(),
        image: "leemme/ml-pythonenv:latest".to_string(),
        container_port: 8000,
        target_port: 8000,
    }
}

fn manager() -> (Arc<InMemoryCluster>, GroupManager) {
    let cluster = Arc::new(InMemoryCluster::new());
    let manager = GroupManager::new(
        cluster.clone(),
        NS,
        WorkloadSettings::default(),
        GroupLocks::new(),
    );
    (cluster, manager)
}

fn create_error(err: Error) -> CreateGroupError {
    match err {
        Error::CreateGroup(inner) => *inner,
        other => panic!("expected CreateGroup error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_builds_all_three_members() {
    let (cluster, manager) = manager();
    let created = manager.create(&template("fraud-model")).await.unwrap();

    assert_eq!(created.name, "fraud-model");
    assert_eq!(created.deployment, "fraud-model-deployment");
    assert_eq!(created.service, "python-service-fraud-model");
    assert_eq!(created.autoscaler, "fraud-model-hpa");
    assert!(created.message.contains(NS));

    assert!(cluster.namespace_exists(NS));
    assert!(cluster.get_deployment(NS, "fraud-model-deployment").await.is_ok());
    assert!(cluster.get_service(NS, "python-service-fraud-model").await.is_ok());
    assert!(cluster.get_autoscaler(NS, "fraud-model-hpa").await.is_ok());
}

#[tokio::test]
async fn test_create_derives_name_from_file_name() {
    let (_cluster, manager) = manager();
    let created = manager.create(&template("Fraud_Model.h5")).await.unwrap();
    assert_eq!(created.name, "fraud-model");
    assert_eq!(created.deployment, "fraud-model-deployment");
}

#[tokio::test]
async fn test_create_rejects_empty_name() {
    let (cluster, manager) = manager();
    let err = manager.create(&template("   ")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    // Nothing reaches the orchestrator
    assert!(!cluster.namespace_exists(NS));
}

#[tokio::test]
async fn test_workload_failure_skips_autoscaler() {
    let (cluster, manager) = manager();
    cluster.fail_on(ClusterOp::Create, ResourceKind::Deployment, 422, "invalid image");

    let err = create_error(manager.create(&template("fraud-model")).await.unwrap_err());
    assert_eq!(err.stage, CreateStage::Workload);
    assert!(err.rolled_back.is_empty());
    assert!(cluster.get_autoscaler(NS, "fraud-model-hpa").await.unwrap_err().is_not_found());
    assert!(cluster.get_service(NS, "python-service-fraud-model").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_service_failure_rolls_back_in_reverse() {
    let (cluster, manager) = manager();
    cluster.fail_on(ClusterOp::Create, ResourceKind::Service, 403, "quota exceeded");

    let err = create_error(manager.create(&template("fraud-model")).await.unwrap_err());
    assert_eq!(err.stage, CreateStage::Service);
    assert!(matches!(err.source, ClusterError::Rejected { code: 403, .. }));
    assert_eq!(
        err.rolled_back,
        vec![
            ResourceRef::new(ResourceKind::HorizontalPodAutoscaler, "fraud-model-hpa"),
            ResourceRef::new(ResourceKind::Deployment, "fraud-model-deployment"),
        ]
    );
    assert!(err.rollback_failures.is_empty());

    assert!(cluster.get_deployment(NS, "fraud-model-deployment").await.unwrap_err().is_not_found());
    assert!(cluster.get_autoscaler(NS, "fraud-model-hpa").await.unwrap_err().is_not_found());
    assert!(cluster.list_pods(NS).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rollback_failures_are_reported() {
    let (cluster, manager) = manager();
    cluster.fail_on(ClusterOp::Create, ResourceKind::Service, 500, "boom");
    cluster.fail_on(ClusterOp::Delete, ResourceKind::Deployment, 500, "stuck");

    let err = create_error(manager.create(&template("fraud-model")).await.unwrap_err());
    assert_eq!(err.rolled_back.len(), 1);
    assert_eq!(err.rollback_failures.len(), 1);
    assert_eq!(err.rollback_failures[0].resource.kind, ResourceKind::Deployment);
}

#[tokio::test]
async fn test_existing_group_is_not_torn_down_by_failed_create() {
    let (cluster, manager) = manager();
    manager.create(&template("fraud-model")).await.unwrap();

    // Second create collides on the workload; nothing of the first group is touched
    let err = create_error(manager.create(&template("fraud-model")).await.unwrap_err());
    assert_eq!(err.stage, CreateStage::Workload);
    assert!(err.source.is_already_exists());
    assert!(cluster.get_deployment(NS, "fraud-model-deployment").await.is_ok());
    assert!(cluster.get_service(NS, "python-service-fraud-model").await.is_ok());
}

#[tokio::test]
async fn test_create_and_delete_leave_no_lock_entries() {
    let cluster = Arc::new(InMemoryCluster::new());
    let locks = GroupLocks::new();
    let manager = GroupManager::new(cluster.clone(), NS, WorkloadSettings::default(), locks.clone());

    manager.create(&template("fraud-model")).await.unwrap();
    assert!(locks.is_empty());

    cluster.fail_on(ClusterOp::Create, ResourceKind::Service, 500, "boom");
    for i in 0..16 {
        assert!(manager.create(&template(&format!("model-{i}"))).await.is_err());
    }
    assert!(locks.is_empty());

    manager.delete("fraud-model").await.unwrap();
    assert!(locks.is_empty());
}

#[tokio::test]
async fn test_delete_full_group() {
    let (cluster, manager) = manager();
    manager.create(&template("fraud-model")).await.unwrap();

    let outcome = manager.delete("fraud-model").await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(
        outcome.deleted_kinds(),
        vec![
            ResourceKind::Pod,
            ResourceKind::Deployment,
            ResourceKind::Service,
            ResourceKind::HorizontalPodAutoscaler,
        ]
    );
    assert!(cluster.list_deployments(NS).await.unwrap().is_empty());
    assert!(cluster.list_services(NS).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_accepts_workload_name() {
    let (_cluster, manager) = manager();
    manager.create(&template("fraud-model")).await.unwrap();

    let outcome = manager.delete("fraud-model-deployment").await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.deleted.len(), 4);
}

#[tokio::test]
async fn test_delete_missing_group_reports_every_kind() {
    let (_cluster, manager) = manager();
    let outcome = manager.delete("ghost").await.unwrap();

    assert!(outcome.deleted.is_empty());
    assert_eq!(outcome.failed_to_delete.len(), 4);
    assert!(outcome.failed_to_delete.iter().all(|f| f.not_found));
    assert_eq!(outcome.failed_to_delete[0].resource.name, "app=ghost");
}

#[tokio::test]
async fn test_delete_continues_past_failures() {
    let (cluster, manager) = manager();
    manager.create(&template("fraud-model")).await.unwrap();
    cluster.fail_on(ClusterOp::Delete, ResourceKind::Service, 500, "boom");

    let outcome = manager.delete("fraud-model").await.unwrap();
    assert_eq!(outcome.failed_kinds(), vec![ResourceKind::Service]);
    assert!(!outcome.failed_to_delete[0].not_found);
    assert!(outcome.deleted_kinds().contains(&ResourceKind::HorizontalPodAutoscaler));
}

#[tokio::test]
async fn test_delete_leaves_other_groups_alone() {
    let (cluster, manager) = manager();
    manager.create(&template("fraud-model")).await.unwrap();
    manager.create(&template("churn")).await.unwrap();

    manager.delete("fraud-model").await.unwrap();
    let pods = cluster.list_pods(NS).await.unwrap();
    assert_eq!(pods.len(), 1);
    assert!(cluster.get_deployment(NS, "churn-deployment").await.is_ok());
}

#[tokio::test]
async fn test_delete_pod() {
    let (cluster, manager) = manager();
    manager.create(&template("fraud-model")).await.unwrap();
    let pods = cluster.list_pods(NS).await.unwrap();
    let name = pods[0].metadata.name.clone().unwrap();

    let deleted = manager.delete_pod(&name).await.unwrap();
    assert_eq!(deleted.kind, ResourceKind::Pod);

    let err = manager.delete_pod(&name).await.unwrap_err();
    assert!(matches!(err, Error::Cluster(ref e) if e.is_not_found()));
    assert!(matches!(manager.delete_pod("").await, Err(Error::Validation(_))));
}
