// Event log HTTP routes
//
// The POST routes are the producer write path (EmissionFacade); the GET
// routes are the catch-up primitives clients use between live sessions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use flowline_core::{Actor, Event, EventType, NewEvent};

use crate::common::{LatestSequenceResponse, ListResponse};
use crate::services::EventService;

/// App state for event routes
#[derive(Clone)]
pub struct AppState {
    pub event_service: Arc<EventService>,
}

/// Query parameters for event listing
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct EventsQuery {
    /// Return events with sequence number greater than this (default 0)
    pub after_sequence: Option<i64>,
    /// Maximum number of events to return
    pub limit: Option<i64>,
}

/// Body for emitting one event; the workspace comes from the path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmitEventRequest {
    pub event_type: EventType,
    pub actor: Actor,
    pub data: Value,
    pub version: Option<i32>,
}

impl EmitEventRequest {
    fn into_new_event(self, workspace_id: Uuid) -> NewEvent {
        NewEvent {
            event_type: self.event_type,
            workspace_id,
            actor: self.actor,
            data: self.data,
            version: self.version.unwrap_or(1),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmitEventBatchRequest {
    pub events: Vec<EmitEventRequest>,
}

/// Create event routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/workspaces/:workspace_id/events", post(emit_event))
        .route(
            "/v1/workspaces/:workspace_id/events/batch",
            post(emit_event_batch),
        )
        .route("/v1/workspaces/:workspace_id/events", get(list_events))
        .route(
            "/v1/workspaces/:workspace_id/events/latest-sequence",
            get(latest_sequence),
        )
        .with_state(state)
}

/// POST /v1/workspaces/{workspace_id}/events - Emit one event
#[utoipa::path(
    post,
    path = "/v1/workspaces/{workspace_id}/events",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    request_body = EmitEventRequest,
    responses(
        (status = 201, description = "Event stored", body = Event),
        (status = 500, description = "Persistence failure")
    ),
    tag = "events"
)]
pub async fn emit_event(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(body): Json<EmitEventRequest>,
) -> Result<(StatusCode, Json<Event>), StatusCode> {
    let stored = state
        .event_service
        .emit(body.into_new_event(workspace_id))
        .await
        .map_err(|e| {
            tracing::error!(workspace_id = %workspace_id, error = %e, "failed to store event");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /v1/workspaces/{workspace_id}/events/batch - Emit a batch of events
#[utoipa::path(
    post,
    path = "/v1/workspaces/{workspace_id}/events/batch",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    request_body = EmitEventBatchRequest,
    responses(
        (status = 201, description = "Events stored", body = ListResponse<Event>),
        (status = 500, description = "Persistence failure")
    ),
    tag = "events"
)]
pub async fn emit_event_batch(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(body): Json<EmitEventBatchRequest>,
) -> Result<(StatusCode, Json<ListResponse<Event>>), StatusCode> {
    let events = body
        .events
        .into_iter()
        .map(|e| e.into_new_event(workspace_id))
        .collect();
    let stored = state.event_service.emit_batch(events).await.map_err(|e| {
        tracing::error!(workspace_id = %workspace_id, error = %e, "failed to store event batch");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(ListResponse { data: stored })))
}

/// GET /v1/workspaces/{workspace_id}/events - List events after a sequence number
#[utoipa::path(
    get,
    path = "/v1/workspaces/{workspace_id}/events",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID"), EventsQuery),
    responses(
        (status = 200, description = "Events ascending by sequence", body = ListResponse<Event>),
        (status = 500, description = "Persistence failure")
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<ListResponse<Event>>, StatusCode> {
    let events = state
        .event_service
        .list(workspace_id, query.after_sequence.unwrap_or(0), query.limit)
        .await
        .map_err(|e| {
            tracing::error!(workspace_id = %workspace_id, error = %e, "failed to list events");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(ListResponse { data: events }))
}

/// GET /v1/workspaces/{workspace_id}/events/latest-sequence
#[utoipa::path(
    get,
    path = "/v1/workspaces/{workspace_id}/events/latest-sequence",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "Latest sequence number (0 when empty)", body = LatestSequenceResponse),
        (status = 500, description = "Persistence failure")
    ),
    tag = "events"
)]
pub async fn latest_sequence(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<LatestSequenceResponse>, StatusCode> {
    let latest_sequence = state
        .event_service
        .latest_sequence(workspace_id)
        .await
        .map_err(|e| {
            tracing::error!(workspace_id = %workspace_id, error = %e, "failed to read latest sequence");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(LatestSequenceResponse { latest_sequence }))
}
