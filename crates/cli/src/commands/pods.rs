//! Pod commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, PodDeleted, PodInfo, PodRequest, PodWithServices};
use crate::output::{color_phase, print_json, print_rows, print_success, OutputFormat};

/// Row for pods table
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Services")]
    services: String,
}

fn row(pod: &PodInfo, services: String) -> PodRow {
    PodRow {
        name: pod.name.clone(),
        phase: color_phase(pod.phase.as_deref().unwrap_or("Unknown")),
        ip: pod.pod_ip.clone().unwrap_or_else(|| "-".to_string()),
        node: pod.node_name.clone().unwrap_or_else(|| "-".to_string()),
        app: pod.labels.get("app").cloned().unwrap_or_default(),
        services,
    }
}

fn services_column(pod: &PodWithServices) -> String {
    if let Some(err) = &pod.error {
        return err.clone();
    }
    pod.services
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// List pods, for one group or for the whole namespace
pub async fn list(
    client: &ApiClient,
    deployment: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    match deployment {
        Some(deployment) => {
            let pods: Vec<PodInfo> = client
                .get(&format!("getDeploymentPods/{}", deployment))
                .await?;
            let rows = pods.iter().map(|p| row(p, String::new())).collect();
            print_rows(rows, &pods, format, "No pods found")
        }
        None => {
            let pods: Vec<PodWithServices> = client.get("getallPods").await?;
            let rows = pods
                .iter()
                .map(|p| row(&p.pod, services_column(p)))
                .collect();
            print_rows(rows, &pods, format, "No pods found")
        }
    }
}

/// Print a pod's log tail as served
pub async fn logs(client: &ApiClient, pod: &str) -> Result<()> {
    let text = client.get_text(&format!("getPodLogs/{}", pod)).await?;
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}

pub async fn delete(client: &ApiClient, pod_name: String, format: OutputFormat) -> Result<()> {
    let deleted: PodDeleted = client
        .delete("deletePod", &PodRequest { pod_name })
        .await?;

    match format {
        OutputFormat::Json => print_json(&deleted)?,
        OutputFormat::Table => print_success(&format!(
            "Deleted {} {}",
            deleted.deleted.kind, deleted.deleted.name
        )),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServiceInfo;
    use std::collections::BTreeMap;

    fn pod() -> PodInfo {
        PodInfo {
            name: "fraud-model-deployment-abc".to_string(),
            phase: None,
            pod_ip: None,
            node_name: None,
            start_time: None,
            labels: BTreeMap::from([("app".to_string(), "fraud-model".to_string())]),
        }
    }

    #[test]
    fn test_row_fills_missing_fields() {
        colored::control::set_override(false);
        let r = row(&pod(), String::new());
        assert_eq!(r.phase, "Unknown");
        assert_eq!(r.ip, "-");
        assert_eq!(r.app, "fraud-model");
    }

    #[test]
    fn test_services_column_prefers_error() {
        let mut joined = PodWithServices {
            pod: pod(),
            services: vec![
                ServiceInfo {
                    name: "a".to_string(),
                    ..Default::default()
                },
                ServiceInfo {
                    name: "b".to_string(),
                    ..Default::default()
                },
            ],
            error: None,
            logs_error: None,
        };
        assert_eq!(services_column(&joined), "a,b");

        joined.error = Some("pod has no labels".to_string());
        assert_eq!(services_column(&joined), "pod has no labels");
    }
}
