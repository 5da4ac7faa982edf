// Execution HTTP routes
//
// The external execution engine creates and drives these records; stream
// sessions read them to decide when a stream may terminate.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use flowline_core::Execution;

pub use crate::services::{CreateExecutionRequest, UpdateExecutionRequest};
use crate::services::ExecutionService;

/// App state for execution routes
#[derive(Clone)]
pub struct AppState {
    pub execution_service: Arc<ExecutionService>,
}

/// Create execution routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/executions", post(create_execution))
        .route("/v1/executions/:execution_id", get(get_execution))
        .route("/v1/executions/:execution_id", patch(update_execution))
        .with_state(state)
}

/// POST /v1/executions - Create an execution record
#[utoipa::path(
    post,
    path = "/v1/executions",
    request_body = CreateExecutionRequest,
    responses(
        (status = 201, description = "Execution created", body = Execution),
        (status = 500, description = "Persistence failure")
    ),
    tag = "executions"
)]
pub async fn create_execution(
    State(state): State<AppState>,
    Json(body): Json<CreateExecutionRequest>,
) -> Result<(StatusCode, Json<Execution>), StatusCode> {
    let execution = state.execution_service.create(body).await.map_err(|e| {
        tracing::error!(error = %e, "failed to create execution");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(execution)))
}

/// GET /v1/executions/{execution_id} - Get execution status
#[utoipa::path(
    get,
    path = "/v1/executions/{execution_id}",
    params(("execution_id" = Uuid, Path, description = "Execution ID")),
    responses(
        (status = 200, description = "Execution", body = Execution),
        (status = 404, description = "Execution not found"),
        (status = 500, description = "Persistence failure")
    ),
    tag = "executions"
)]
pub async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<Execution>, StatusCode> {
    let execution = state
        .execution_service
        .get(execution_id)
        .await
        .map_err(|e| {
            tracing::error!(execution_id = %execution_id, error = %e, "failed to get execution");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(execution))
}

/// PATCH /v1/executions/{execution_id} - Update execution status/result
#[utoipa::path(
    patch,
    path = "/v1/executions/{execution_id}",
    params(("execution_id" = Uuid, Path, description = "Execution ID")),
    request_body = UpdateExecutionRequest,
    responses(
        (status = 200, description = "Updated execution", body = Execution),
        (status = 404, description = "Execution not found"),
        (status = 500, description = "Persistence failure")
    ),
    tag = "executions"
)]
pub async fn update_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
    Json(body): Json<UpdateExecutionRequest>,
) -> Result<Json<Execution>, StatusCode> {
    let execution = state
        .execution_service
        .update(execution_id, body)
        .await
        .map_err(|e| {
            tracing::error!(execution_id = %execution_id, error = %e, "failed to update execution");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(execution))
}
