//! API client for the model control plane

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the control-plane REST surface
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client rooted at the control-plane base path
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        // Relative joins keep the base path only with a trailing slash
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .context("Invalid path")
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        accepted: &[StatusCode],
    ) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;
        let status = response.status();

        if !status.is_success() && !accepted.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        self.execute(self.client.get(url), &[]).await
    }

    /// Make a GET request returning plain text
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let url = self.url(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }
        Ok(body)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        self.execute(self.client.post(url).json(body), &[]).await
    }

    /// POST for scaling endpoints, where 422 carries a rejected outcome
    pub async fn post_scale<B: Serialize>(&self, path: &str, body: &B) -> Result<ScaleOutcome> {
        let url = self.url(path)?;
        self.execute(
            self.client.post(url).json(body),
            &[StatusCode::UNPROCESSABLE_ENTITY],
        )
        .await
    }

    /// Make a DELETE request with JSON body
    pub async fn delete<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path)?;
        self.execute(self.client.delete(url).json(body), &[]).await
    }
}

// API request/response types

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupRequest {
    pub deployment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaleRequest {
    pub deployment: String,
    pub replicas: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRequest {
    pub pod_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub address: String,
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCreated {
    pub name: String,
    pub namespace: String,
    pub deployment: String,
    pub service: String,
    pub autoscaler: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDeletion {
    pub kind: String,
    pub name: String,
    pub reason: String,
    #[serde(default)]
    pub not_found: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    #[serde(rename = "Deleted")]
    pub deleted: Vec<ResourceRef>,
    #[serde(rename = "FailedToDelete")]
    pub failed_to_delete: Vec<FailedDeletion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodDeleted {
    pub deleted: ResourceRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub port: i32,
    #[serde(default)]
    pub target_port: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    #[serde(default, rename = "clusterIP")]
    pub cluster_ip: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatus {
    pub name: String,
    pub deployment: String,
    pub namespace: String,
    pub replicas: Option<i32>,
    pub available_replicas: Option<i32>,
    pub ready_replicas: Option<i32>,
    pub creation_timestamp: Option<String>,
    #[serde(default)]
    pub service: ServiceInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    pub name: String,
    pub phase: Option<String>,
    pub pod_ip: Option<String>,
    pub node_name: Option<String>,
    pub start_time: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodWithServices {
    #[serde(flatten)]
    pub pod: PodInfo,
    #[serde(default)]
    pub services: Vec<ServiceInfo>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub logs_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_base_path_is_kept_on_join() {
        let client = ApiClient::new("http://localhost:8080/api/ControlPlane").unwrap();
        assert_eq!(
            client.url("getDeployments").unwrap().as_str(),
            "http://localhost:8080/api/ControlPlane/getDeployments"
        );
        assert_eq!(
            client.url("/getPodLogs/p-1").unwrap().as_str(),
            "http://localhost:8080/api/ControlPlane/getPodLogs/p-1"
        );
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/ControlPlane/scalePod")
            .with_status(404)
            .with_body(r#"{"error":"Deployment 'ghost-deployment' not found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/api/ControlPlane", server.url())).unwrap();
        let err = client
            .post::<ScaleOutcome, _>(
                "scalePod",
                &ScaleRequest {
                    deployment: "ghost".to_string(),
                    replicas: 2,
                },
            )
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("ghost-deployment"));
    }

    #[tokio::test]
    async fn test_scale_rejection_is_an_outcome() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/ControlPlane/scaleDownPod")
            .with_status(422)
            .with_body(
                r#"{"status":"rejected","deployment":"m-deployment","replicas":1,"reason":"cannot scale below 1"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/api/ControlPlane", server.url())).unwrap();
        let outcome = client
            .post_scale(
                "scaleDownPod",
                &GroupRequest {
                    deployment: "m-deployment".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ScaleOutcome::Rejected { replicas: 1, .. }));
    }

    #[tokio::test]
    async fn test_delete_outcome_parses() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/api/ControlPlane/delete")
            .with_status(200)
            .with_body(
                r#"{"Deleted":[{"kind":"Deployment","name":"m-deployment"}],
                    "FailedToDelete":[{"kind":"Service","name":"python-service-m","reason":"not found","notFound":true}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/api/ControlPlane/", server.url())).unwrap();
        let outcome: DeleteOutcome = client
            .delete(
                "delete",
                &GroupRequest {
                    deployment: "m".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.deleted.len(), 1);
        assert!(outcome.failed_to_delete[0].not_found);
    }

    #[test]
    fn test_service_info_reads_cluster_ip() {
        let service: ServiceInfo = serde_json::from_str(
            r#"{"name":"python-service-m","clusterIP":"10.0.0.7","serviceType":"LoadBalancer"}"#,
        )
        .unwrap();
        assert_eq!(service.cluster_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(service.service_type.as_deref(), Some("LoadBalancer"));
    }

    #[tokio::test]
    async fn test_logs_are_plain_text() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/ControlPlane/getPodLogs/p-1")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("line one\nline two")
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/api/ControlPlane", server.url())).unwrap();
        let logs = client.get_text("getPodLogs/p-1").await.unwrap();
        assert_eq!(logs, "line one\nline two");
    }
}
