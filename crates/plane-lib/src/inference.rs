//! Forwarding of feature vectors to model-serving workloads

use crate::error::{Error, ProxyError, Result};
use crate::observability::PlaneMetrics;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Path every model-serving workload exposes
pub const PREDICT_PATH: &str = "/predict/";

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    features: &'a [f64],
}

/// Body returned by the serving image
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictResponse {
    pub prediction: Vec<Vec<f64>>,
}

impl PredictResponse {
    pub fn first(&self) -> Option<f64> {
        self.prediction.first().and_then(|row| row.first()).copied()
    }
}

/// HTTP client for model inference endpoints
#[derive(Clone)]
pub struct InferenceProxy {
    client: Client,
    metrics: PlaneMetrics,
}

impl InferenceProxy {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Proxy(transport_error("client", e)))?;
        Ok(Self {
            client,
            metrics: PlaneMetrics::new(),
        })
    }

    /// Inference URL for a workload address such as `10.0.0.5` or `host:8000`
    pub fn predict_url(address: &str) -> String {
        let address = address.trim().trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            format!("{}{}", address, PREDICT_PATH)
        } else {
            format!("http://{}{}", address, PREDICT_PATH)
        }
    }

    /// Send `features` to the workload at `address` and return the first prediction
    pub async fn predict(&self, address: &str, features: &[f64]) -> Result<f64, ProxyError> {
        let url = Self::predict_url(address);
        let started = Instant::now();
        let result = self.send(&url, features).await;
        self.metrics
            .observe_inference(started.elapsed().as_secs_f64(), result.is_ok());
        if let Err(err) = &result {
            warn!(url = %url, error = %err, "Inference request failed");
        }
        result
    }

    async fn send(&self, url: &str, features: &[f64]) -> Result<f64, ProxyError> {
        debug!(url = %url, features = features.len(), "Forwarding inference request");
        let response = self
            .client
            .post(url)
            .json(&PredictRequest { features })
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(url, e))?;

        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse =
            serde_json::from_str(&body).map_err(|e| ProxyError::MalformedResponse {
                status: status.as_u16(),
                body: body.clone(),
                reason: e.to_string(),
            })?;

        parsed.first().ok_or_else(|| ProxyError::MalformedResponse {
            status: status.as_u16(),
            body,
            reason: "prediction is empty".to_string(),
        })
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::Timeout {
            url: url.to_string(),
        }
    } else {
        ProxyError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn proxy() -> InferenceProxy {
        InferenceProxy::new(Duration::from_secs(5)).unwrap()
    }

    fn address(server: &Server) -> String {
        server.host_with_port()
    }

    #[test]
    fn test_predict_url() {
        assert_eq!(
            InferenceProxy::predict_url("10.0.0.5"),
            "http://10.0.0.5/predict/"
        );
        assert_eq!(
            InferenceProxy::predict_url("http://svc:8000/"),
            "http://svc:8000/predict/"
        );
    }

    #[tokio::test]
    async fn test_predict_returns_first_scalar() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/predict/")
            .match_body(Matcher::Json(serde_json::json!({"features": [1.0, 2.5]})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prediction":[[0.87]]}"#)
            .create_async()
            .await;

        let value = proxy().predict(&address(&server), &[1.0, 2.5]).await.unwrap();
        assert!((value - 0.87).abs() < f64::EPSILON);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status_and_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/predict/")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let err = proxy().predict(&address(&server), &[1.0]).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.body(), Some("model not loaded"));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/predict/")
            .with_status(200)
            .with_body(r#"{"prediction":0.5}"#)
            .create_async()
            .await;

        let err = proxy().predict(&address(&server), &[1.0]).await.unwrap_err();
        assert!(matches!(err, ProxyError::MalformedResponse { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_empty_prediction_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/predict/")
            .with_status(200)
            .with_body(r#"{"prediction":[]}"#)
            .create_async()
            .await;

        let err = proxy().predict(&address(&server), &[1.0]).await.unwrap_err();
        assert!(matches!(err, ProxyError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_address_is_transport_error() {
        // Port 1 on loopback refuses connections
        let err = proxy().predict("127.0.0.1:1", &[1.0]).await.unwrap_err();
        assert!(matches!(err, ProxyError::Transport { .. }));
        assert_eq!(err.status(), None);
    }
}
