use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{PartitionInfo, SchedulerClient, SchedulerClientError};
use crate::config::DashboardSettings;
use crate::layout::{LayoutConfig, LayoutSnapshot, layout_collapsed, parse_path_list};
use crate::utilization::{UtilizationChart, chart_for_partition};

#[derive(Debug, Clone)]
pub struct AppState {
    client: SchedulerClient,
    layout: LayoutConfig,
}

impl AppState {
    pub fn new(client: SchedulerClient, layout: LayoutConfig) -> Self {
        Self { client, layout }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LayoutQuery {
    collapsed: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

/// Handler failure; the status is derived from the error chain.
#[derive(Debug)]
struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code_for_error(&self.0);
        let details = error_details(&self.0);
        warn!(
            status = status.as_u16(),
            error = %details,
            "HTTP request failed"
        );
        (status, Json(ErrorBody { error: details })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/partitions", get(handle_partitions))
        .route(
            "/api/partitions/:partition/queue-layout",
            get(handle_queue_layout),
        )
        .route(
            "/api/partitions/:partition/utilization",
            get(handle_utilization),
        )
        .with_state(state)
}

pub async fn run_http_server(settings: &DashboardSettings, bind: &str) -> Result<()> {
    let state = AppState::new(SchedulerClient::new(settings), LayoutConfig::default());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind HTTP server to `{bind}`"))?;
    let local_addr = listener.local_addr().ok();

    info!(
        scheduler = %settings.scheduler_base_url,
        requested_bind = %bind,
        bound_addr = local_addr.map(|addr| addr.to_string()),
        "starting HTTP server"
    );

    axum::serve(listener, app)
        .await
        .context("HTTP server exited with an error")
}

async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn handle_partitions(
    State(state): State<AppState>,
) -> Result<Json<Vec<PartitionInfo>>, ApiError> {
    let partitions = state
        .client
        .fetch_partitions()
        .await
        .context("failed to fetch partitions")?;
    Ok(Json(partitions))
}

async fn handle_queue_layout(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Query(query): Query<LayoutQuery>,
) -> Result<Json<LayoutSnapshot>, ApiError> {
    let tree = state
        .client
        .fetch_queue_tree(&partition)
        .await
        .with_context(|| format!("failed to fetch queues of partition `{partition}`"))?;
    let collapsed = query
        .collapsed
        .as_deref()
        .map(parse_path_list)
        .unwrap_or_default();

    let snapshot = layout_collapsed(tree, &collapsed, state.layout);
    debug!(
        partition = %partition,
        nodes = snapshot.nodes.len(),
        collapsed = collapsed.len(),
        "served queue layout"
    );
    Ok(Json(snapshot))
}

async fn handle_utilization(
    State(state): State<AppState>,
    Path(partition): Path<String>,
) -> Result<Json<UtilizationChart>, ApiError> {
    let infos = state
        .client
        .fetch_node_utilizations()
        .await
        .context("failed to fetch node utilizations")?;
    Ok(Json(chart_for_partition(&infos, &partition)))
}

fn error_details(error: &anyhow::Error) -> String {
    error
        .chain()
        .map(std::string::ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

fn status_code_for_error(error: &anyhow::Error) -> StatusCode {
    let upstream = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SchedulerClientError>());

    match upstream {
        Some(error) if error.is_not_found() => StatusCode::NOT_FOUND,
        Some(_) => StatusCode::BAD_GATEWAY,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
