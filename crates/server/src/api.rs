//! REST API for model deployment groups, plus health and metrics

use crate::config::PlaneConfig;
use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path,
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use plane_lib::{
    ensure_namespace,
    health::{Component, ComponentStatus, HealthRegistry},
    naming::GroupNames,
    ClusterApi, ClusterError, Error, GroupCreated, GroupLocks, GroupManager, GroupTemplate,
    InferenceProxy, ModelStore, ProxyError, ResourceRef, ScaleOutcome, ScalingController,
    StatusAggregator, StepDirection,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub const BANNER: &str = "Control Plane API for managing ML models";

/// Defaults applied to group creation requests
#[derive(Debug, Clone)]
pub struct CreateDefaults {
    pub image: String,
    pub container_port: i32,
    pub target_port: i32,
}

/// Shared application state
pub struct AppState {
    pub namespace: String,
    pub groups: GroupManager,
    pub scaling: ScalingController,
    pub status: StatusAggregator,
    pub proxy: InferenceProxy,
    pub store: ModelStore,
    pub health_registry: HealthRegistry,
    pub defaults: CreateDefaults,
}

impl AppState {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        config: &PlaneConfig,
        health_registry: HealthRegistry,
    ) -> anyhow::Result<Self> {
        let locks = GroupLocks::new();
        Ok(Self {
            namespace: config.namespace.clone(),
            groups: GroupManager::new(
                cluster.clone(),
                config.namespace.clone(),
                config.workload_settings(),
                locks.clone(),
            ),
            scaling: ScalingController::new(cluster.clone(), config.namespace.clone(), locks),
            status: StatusAggregator::new(cluster, config.log_tail()),
            proxy: InferenceProxy::new(config.inference_timeout())?,
            store: ModelStore::new(config.upload_dir.clone()),
            health_registry,
            defaults: CreateDefaults {
                image: config.default_image.clone(),
                container_port: config.container_port,
                target_port: config.target_port,
            },
        })
    }

    /// Fold an orchestrator call's outcome into the orchestrator's health.
    ///
    /// Any answer below 500 means it is reachable again; unanswered calls
    /// and server errors mark it unhealthy.
    async fn observe<T>(&self, result: plane_lib::Result<T>) -> plane_lib::Result<T> {
        // Outer None: the error never reached the orchestrator
        let verdict = match &result {
            Ok(_) => Some(None),
            Err(err) => err
                .cluster_error()
                .map(|cause| cause.is_unavailable().then(|| cause.to_string())),
        };
        match verdict {
            Some(Some(detail)) => {
                self.health_registry
                    .mark_unhealthy(Component::Orchestrator, detail)
                    .await
            }
            Some(None) => self.health_registry.mark_healthy(Component::Orchestrator).await,
            None => {}
        }
        result
    }

    fn template(&self, req: CreateGroupRequest) -> GroupTemplate {
        GroupTemplate {
            model_name: req.model_name,
            image: req
                .image
                .filter(|i| !i.trim().is_empty())
                .unwrap_or_else(|| self.defaults.image.clone()),
            container_port: req.container_port.unwrap_or(self.defaults.container_port),
            target_port: req.target_port.unwrap_or(self.defaults.target_port),
        }
    }
}

/// API error rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    Plane(Error),
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Plane(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(format!("invalid multipart body: {}", e))
    }
}

fn cluster_status(err: &ClusterError) -> StatusCode {
    match err {
        ClusterError::NotFound { .. } => StatusCode::NOT_FOUND,
        ClusterError::AlreadyExists { .. } | ClusterError::Conflict { .. } => StatusCode::CONFLICT,
        ClusterError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ClusterError::Rejected { .. } | ClusterError::Transport { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Plane(err) => match err {
                Error::Validation(_) => (
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({ "error": err.to_string() }),
                ),
                Error::Cluster(e) => (
                    cluster_status(e),
                    serde_json::json!({ "error": e.to_string() }),
                ),
                Error::CreateGroup(e) => (
                    cluster_status(&e.source),
                    serde_json::json!({
                        "error": e.to_string(),
                        "stage": e.stage,
                        "rolledBack": e.rolled_back,
                        "rollbackFailures": e.rollback_failures,
                    }),
                ),
                Error::Proxy(e) => {
                    let status = match e {
                        ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                        _ => StatusCode::BAD_GATEWAY,
                    };
                    (
                        status,
                        serde_json::json!({
                            "error": e.to_string(),
                            "upstreamStatus": e.status(),
                            "upstreamBody": e.body(),
                        }),
                    )
                }
                other => {
                    error!(error = %other, "Request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        serde_json::json!({ "error": other.to_string() }),
                    )
                }
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[serde(alias = "ModelName")]
    pub model_name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub container_port: Option<i32>,
    #[serde(default)]
    pub target_port: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    #[serde(alias = "PodName")]
    pub deployment: String,
}

#[derive(Debug, Deserialize)]
pub struct ScaleRequest {
    #[serde(alias = "PodName")]
    pub deployment: String,
    #[serde(alias = "Replicas")]
    pub replicas: i32,
}

#[derive(Debug, Deserialize)]
pub struct PodRequest {
    #[serde(rename = "podName", alias = "PodName")]
    pub pod_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(alias = "Ip")]
    pub address: String,
    #[serde(alias = "Features")]
    pub features: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub model_path: PathBuf,
    pub deployment: GroupCreated,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

#[derive(Debug, Serialize)]
pub struct PodDeleted {
    pub deleted: ResourceRef,
}

async fn banner() -> &'static str {
    BANNER
}

async fn upload_model(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            upload = Some((file_name, bytes));
            break;
        }
    }
    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("No model file provided.".to_string()))?;

    // Reject unusable names before anything is written
    GroupNames::for_model(&file_name)?;

    let model_path = match state.store.save(&file_name, &bytes).await {
        Ok(path) => path,
        Err(err @ Error::Io(_)) => {
            state
                .health_registry
                .mark_degraded(Component::ModelStore, err.to_string())
                .await;
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };
    state
        .health_registry
        .mark_healthy(Component::ModelStore)
        .await;

    let template = state.template(CreateGroupRequest {
        model_name: file_name.clone(),
        image: None,
        container_port: None,
        target_port: None,
    });
    let created = state.observe(state.groups.create(&template).await).await?;

    Ok(Json(UploadResponse {
        message: format!("Model {} uploaded successfully", file_name),
        model_path,
        deployment: created,
    }))
}

async fn create_deployment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> ApiResult<Json<GroupCreated>> {
    let Json(req) = payload?;
    let template = state.template(req);
    Ok(Json(state.observe(state.groups.create(&template).await).await?))
}

async fn get_deployments(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let groups = state.status.list_groups(&state.namespace).await;
    Ok(Json(state.observe(groups).await?))
}

async fn get_deployment_pods(
    State(state): State<Arc<AppState>>,
    Path(deployment): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let pods = state
        .status
        .list_pods_for_group(&state.namespace, &deployment)
        .await;
    Ok(Json(state.observe(pods).await?))
}

async fn get_all_pods(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let pods = state
        .status
        .list_all_pods_with_services(&state.namespace)
        .await;
    Ok(Json(state.observe(pods).await?))
}

async fn get_pod_logs(
    State(state): State<Arc<AppState>>,
    Path(pod): Path<String>,
) -> ApiResult<String> {
    let logs = state.status.fetch_logs(&state.namespace, &pod).await;
    Ok(state.observe(logs).await?)
}

async fn delete_pod(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PodRequest>, JsonRejection>,
) -> ApiResult<Json<PodDeleted>> {
    let Json(req) = payload?;
    let deleted = state.observe(state.groups.delete_pod(&req.pod_name).await).await?;
    Ok(Json(PodDeleted { deleted }))
}

async fn delete_group(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    Ok(Json(state.observe(state.groups.delete(&req.deployment).await).await?))
}

/// Rejections are reported with their outcome as the body
fn scale_response(outcome: ScaleOutcome) -> Response {
    let status = if outcome.is_rejected() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    (status, Json(outcome)).into_response()
}

async fn scale(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScaleRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let outcome = state
        .scaling
        .set_absolute(&req.deployment, req.replicas)
        .await;
    let outcome = state.observe(outcome).await?;
    Ok(scale_response(outcome))
}

async fn scale_up(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let outcome = state.scaling.step(&req.deployment, StepDirection::Up).await;
    let outcome = state.observe(outcome).await?;
    Ok(scale_response(outcome))
}

async fn scale_down(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let outcome = state
        .scaling
        .step(&req.deployment, StepDirection::Down)
        .await;
    let outcome = state.observe(outcome).await?;
    Ok(scale_response(outcome))
}

async fn stop_deployment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let outcome = state.scaling.stop(&req.deployment).await;
    Ok(scale_response(state.observe(outcome).await?))
}

async fn start_deployment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let outcome = state.scaling.start(&req.deployment).await;
    Ok(scale_response(state.observe(outcome).await?))
}

async fn call_deployment_api(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let Json(req) = payload?;
    if req.address.trim().is_empty() {
        return Err(ApiError::BadRequest("address must not be empty".to_string()));
    }
    let prediction = state
        .proxy
        .predict(&req.address, &req.features)
        .await
        .map_err(Error::from)?;
    Ok(Json(PredictResponse { prediction }))
}

/// Health check response - 200 while operational, 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.health_registry.report().await;

    let status_code = match report.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(report))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Provision the namespace and record whether the orchestrator answered
pub async fn check_orchestrator(
    cluster: &dyn ClusterApi,
    namespace: &str,
    registry: &HealthRegistry,
) -> bool {
    match ensure_namespace(cluster, namespace).await {
        Ok(()) => {
            registry.mark_healthy(Component::Orchestrator).await;
            true
        }
        Err(err) => {
            warn!(error = %err, namespace = %namespace, "Orchestrator check failed");
            registry
                .mark_unhealthy(Component::Orchestrator, err.to_string())
                .await;
            false
        }
    }
}

/// Repeat [`check_orchestrator`] every `every` until the task is aborted
pub fn spawn_orchestrator_checks(
    cluster: Arc<dyn ClusterApi>,
    namespace: String,
    registry: HealthRegistry,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            check_orchestrator(cluster.as_ref(), &namespace, &registry).await;
        }
    })
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, base_path: &str, max_upload_bytes: usize) -> Router {
    let base = base_path.trim_end_matches('/');
    let at = |p: &str| format!("{}{}", base, p);

    let mut router = Router::new();
    if !base.is_empty() {
        router = router.route(base, get(banner));
    }

    router
        .route(&at("/"), get(banner))
        .route(
            &at("/uploadModel"),
            post(upload_model).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(&at("/createDeployment"), post(create_deployment))
        .route(&at("/getDeployments"), get(get_deployments))
        .route(&at("/getDeploymentPods/:deployment"), get(get_deployment_pods))
        .route(&at("/getallPods"), get(get_all_pods))
        .route(&at("/getPodLogs/:pod"), get(get_pod_logs))
        .route(&at("/deletePod"), delete(delete_pod))
        .route(&at("/delete"), delete(delete_group))
        .route(&at("/stopDeployment"), post(stop_deployment))
        .route(&at("/startDeployment"), post(start_deployment))
        .route(&at("/scalePod"), post(scale))
        .route(&at("/scaleUpPod"), post(scale_up))
        .route(&at("/scaleDownPod"), post(scale_down))
        .route(&at("/callDeploymentAPI"), post(call_deployment_api))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server; returns when `shutdown` resolves
pub async fn serve(
    port: u16,
    router: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
