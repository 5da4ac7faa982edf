// Flowline API server library
//
// Routes are assembled here so integration tests can drive the router
// without binding a socket. The binary in main.rs wires configuration,
// tracing, and the listener around build_router.

pub mod common;
pub mod events;
pub mod executions;
pub mod services;
pub mod streams;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use utoipa::OpenApi;

use flowline_core::EventBus;
use flowline_storage::EventStore;

use services::{EventService, ExecutionService};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    dev_mode: bool,
}

async fn health(
    axum::extract::State(dev_mode): axum::extract::State<bool>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        dev_mode,
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        events::emit_event,
        events::emit_event_batch,
        events::list_events,
        events::latest_sequence,
        executions::create_execution,
        executions::get_execution,
        executions::update_execution,
        streams::stream_execution,
    ),
    components(schemas(
        flowline_core::Event,
        flowline_core::NewEvent,
        flowline_core::Actor,
        flowline_core::EventType,
        flowline_core::EntityType,
        flowline_core::Execution,
        flowline_core::ExecutionStatus,
        flowline_protocol::StreamEvent,
        flowline_protocol::StreamEventKind,
        common::LatestSequenceResponse,
        common::ListResponse<flowline_core::Event>,
        events::EmitEventRequest,
        events::EmitEventBatchRequest,
        executions::CreateExecutionRequest,
        executions::UpdateExecutionRequest,
    )),
    tags(
        (name = "events", description = "Durable workspace event log"),
        (name = "executions", description = "Execution status records"),
        (name = "streams", description = "Live execution event streaming (SSE)")
    ),
    info(
        title = "Flowline API",
        version = "0.1.0",
        description = "Event sourcing and live execution streaming",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

/// Build the full application router from its two injected collaborators.
pub fn build_router(store: EventStore, bus: EventBus) -> Router {
    let dev_mode = store.is_dev_mode();
    let event_service = Arc::new(EventService::new(store.clone(), bus));
    let execution_service = Arc::new(ExecutionService::new(
        store.clone(),
        Arc::clone(&event_service),
    ));

    let events_state = events::AppState {
        event_service: Arc::clone(&event_service),
    };
    let executions_state = executions::AppState { execution_service };
    let streams_state = streams::AppState { store };

    Router::new()
        .route("/health", get(health).with_state(dev_mode))
        .merge(events::routes(events_state))
        .merge(executions::routes(executions_state))
        .merge(streams::routes(streams_state))
}
