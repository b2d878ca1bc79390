//! Control-plane library for model deployment groups
//!
//! This crate provides the core functionality for:
//! - Canonical naming of model groups
//! - Group creation with compensation, and teardown
//! - Replica scaling under optimistic concurrency
//! - Status listings over workloads, services and pods
//! - Inference forwarding to model workloads
//! - Health checks and observability

pub mod cluster;
pub mod error;
pub mod group;
pub mod health;
pub mod inference;
pub mod models;
pub mod namespace;
pub mod naming;
pub mod observability;
pub mod scaling;
pub mod status;
pub mod store;

pub use cluster::{ClusterApi, InMemoryCluster, KubeCluster, KubeClusterOptions};
pub use error::{ClusterError, CreateGroupError, CreateStage, Error, ProxyError, Result};
pub use group::{GroupLocks, GroupManager};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthReport, Readiness,
};
pub use inference::InferenceProxy;
pub use models::*;
pub use namespace::ensure_namespace;
pub use naming::{derive_canonical_name, GroupNames};
pub use observability::{PlaneMetrics, StructuredLogger};
pub use scaling::ScalingController;
pub use status::StatusAggregator;
pub use store::ModelStore;
