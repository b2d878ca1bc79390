//! Model group commands

use anyhow::Result;
use chrono::Utc;
use tabled::Tabled;

use crate::client::{
    ApiClient, CreateGroupRequest, DeleteOutcome, GroupCreated, GroupRequest, GroupStatus,
    ScaleOutcome, ScaleRequest,
};
use crate::output::{
    format_age, format_replicas, print_error, print_info, print_json, print_rows, print_success,
    print_warning, OutputFormat,
};

/// Row for groups table
#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "Age")]
    age: String,
}

fn service_column(group: &GroupStatus) -> String {
    match (&group.service.error, &group.service.cluster_ip) {
        (Some(_), _) => format!("{} (unavailable)", group.service.name),
        (None, Some(ip)) => format!("{} ({})", group.service.name, ip),
        (None, None) => group.service.name.clone(),
    }
}

fn ports_column(group: &GroupStatus) -> String {
    group
        .service
        .ports
        .iter()
        .map(|p| match &p.target_port {
            Some(target) => format!("{}->{}", p.port, target),
            None => p.port.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// List every model group in the namespace, newest first
pub async fn list(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let groups: Vec<GroupStatus> = client.get("getDeployments").await?;
    let now = Utc::now();

    let rows = groups
        .iter()
        .map(|g| GroupRow {
            name: g.name.clone(),
            deployment: g.deployment.clone(),
            ready: format_replicas(g.ready_replicas, g.replicas),
            available: g.available_replicas.unwrap_or(0).to_string(),
            service: service_column(g),
            ports: ports_column(g),
            age: format_age(g.creation_timestamp.as_deref(), now),
        })
        .collect();

    print_rows(rows, &groups, format, "No model groups found")
}

/// Create a group for a model that is already on the shared volume
pub async fn create(
    client: &ApiClient,
    request: CreateGroupRequest,
    format: OutputFormat,
) -> Result<()> {
    let created: GroupCreated = client.post("createDeployment", &request).await?;

    match format {
        OutputFormat::Json => print_json(&created)?,
        OutputFormat::Table => {
            print_success(&created.message);
            print_info(&format!("Deployment: {}", created.deployment));
            print_info(&format!("Service:    {}", created.service));
            print_info(&format!("Autoscaler: {}", created.autoscaler));
        }
    }
    Ok(())
}

/// Tear down a group and report what was removed
pub async fn delete(client: &ApiClient, deployment: String, format: OutputFormat) -> Result<()> {
    let outcome: DeleteOutcome = client
        .delete("delete", &GroupRequest { deployment })
        .await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => {
            for resource in &outcome.deleted {
                print_success(&format!("Deleted {} {}", resource.kind, resource.name));
            }
            for failed in &outcome.failed_to_delete {
                let line = format!("{} {}: {}", failed.kind, failed.name, failed.reason);
                if failed.not_found {
                    print_warning(&line);
                } else {
                    print_error(&line);
                }
            }
        }
    }
    Ok(())
}

/// Which scaling endpoint to call
pub enum ScaleAction {
    To(i32),
    Up,
    Down,
    Stop,
    Start,
}

impl ScaleAction {
    fn path(&self) -> &'static str {
        match self {
            ScaleAction::To(_) => "scalePod",
            ScaleAction::Up => "scaleUpPod",
            ScaleAction::Down => "scaleDownPod",
            ScaleAction::Stop => "stopDeployment",
            ScaleAction::Start => "startDeployment",
        }
    }
}

pub async fn scale(
    client: &ApiClient,
    deployment: String,
    action: ScaleAction,
    format: OutputFormat,
) -> Result<()> {
    let outcome = match action {
        ScaleAction::To(replicas) => {
            client
                .post_scale(
                    action.path(),
                    &ScaleRequest {
                        deployment,
                        replicas,
                    },
                )
                .await?
        }
        _ => {
            client
                .post_scale(action.path(), &GroupRequest { deployment })
                .await?
        }
    };

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => match &outcome {
            ScaleOutcome::Scaled {
                deployment,
                from,
                to,
            } => print_success(&format!("Scaled {} from {} to {}", deployment, from, to)),
            ScaleOutcome::Unchanged {
                deployment,
                replicas,
            } => print_info(&format!("{} unchanged at {} replicas", deployment, replicas)),
            ScaleOutcome::Rejected {
                deployment,
                replicas,
                reason,
            } => print_warning(&format!(
                "{} left at {} replicas: {}",
                deployment, replicas, reason
            )),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PortInfo, ServiceInfo};

    fn group(service: ServiceInfo) -> GroupStatus {
        GroupStatus {
            name: "fraud-model".to_string(),
            deployment: "fraud-model-deployment".to_string(),
            namespace: "default".to_string(),
            replicas: Some(1),
            available_replicas: Some(1),
            ready_replicas: Some(1),
            creation_timestamp: None,
            service,
        }
    }

    #[test]
    fn test_service_and_ports_columns() {
        let g = group(ServiceInfo {
            name: "python-service-fraud-model".to_string(),
            cluster_ip: Some("10.0.0.7".to_string()),
            service_type: Some("ClusterIP".to_string()),
            ports: vec![PortInfo {
                port: 80,
                target_port: Some("5000".to_string()),
            }],
            error: None,
        });
        assert_eq!(service_column(&g), "python-service-fraud-model (10.0.0.7)");
        assert_eq!(ports_column(&g), "80->5000");
    }

    #[test]
    fn test_unavailable_service_column() {
        let g = group(ServiceInfo {
            name: "python-service-fraud-model".to_string(),
            error: Some("not found".to_string()),
            ..Default::default()
        });
        assert_eq!(
            service_column(&g),
            "python-service-fraud-model (unavailable)"
        );
        assert_eq!(ports_column(&g), "");
    }

    #[test]
    fn test_scale_paths() {
        assert_eq!(ScaleAction::To(3).path(), "scalePod");
        assert_eq!(ScaleAction::Up.path(), "scaleUpPod");
        assert_eq!(ScaleAction::Down.path(), "scaleDownPod");
        assert_eq!(ScaleAction::Stop.path(), "stopDeployment");
        assert_eq!(ScaleAction::Start.path(), "startDeployment");
    }
}
