// End-to-end tests against the assembled router with in-memory storage.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use flowline_core::EventBus;
use flowline_storage::EventStore;

fn app() -> Router {
    flowline_api::build_router(EventStore::in_memory(), EventBus::new())
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_dev_mode() {
    let app = app();
    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dev_mode"], true);
}

#[tokio::test]
async fn emit_then_list_round_trips() {
    let app = app();
    let workspace_id = Uuid::now_v7();
    let block_id = Uuid::now_v7();

    let (status, stored) = request(
        &app,
        "POST",
        &format!("/v1/workspaces/{workspace_id}/events"),
        Some(json!({
            "event_type": "block.created",
            "actor": { "type": "user", "user_id": Uuid::now_v7().to_string() },
            "data": { "blockId": block_id.to_string(), "name": "summarizer" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(stored["sequence_number"], 1);
    assert_eq!(stored["entity_type"], "block");

    let (status, listed) = request(
        &app,
        "GET",
        &format!("/v1/workspaces/{workspace_id}/events?after_sequence=0"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["event_type"], "block.created");

    let (status, latest) = request(
        &app,
        "GET",
        &format!("/v1/workspaces/{workspace_id}/events/latest-sequence"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["latest_sequence"], 1);
}

#[tokio::test]
async fn batch_emit_assigns_contiguous_sequences() {
    let app = app();
    let workspace_id = Uuid::now_v7();

    let (status, stored) = request(
        &app,
        "POST",
        &format!("/v1/workspaces/{workspace_id}/events/batch"),
        Some(json!({
            "events": [
                { "event_type": "flow.created", "actor": { "type": "system", "reason": "import" }, "data": {} },
                { "event_type": "flow.updated", "actor": { "type": "system", "reason": "import" }, "data": {} }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let sequences: Vec<i64> = stored["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["sequence_number"].as_i64().unwrap())
        .collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[tokio::test]
async fn execution_lifecycle_via_http() {
    let app = app();
    let workspace_id = Uuid::now_v7();

    let (status, execution) = request(
        &app,
        "POST",
        "/v1/executions",
        Some(json!({ "workspace_id": workspace_id.to_string(), "flow_id": Uuid::now_v7().to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(execution["status"], "pending");
    let execution_id = execution["id"].as_str().unwrap().to_string();

    let (status, updated) = request(
        &app,
        "PATCH",
        &format!("/v1/executions/{execution_id}"),
        Some(json!({ "status": "running" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "running");
    assert!(updated["started_at"].is_string());

    // The status transition became a durable workspace event.
    let (_, listed) = request(
        &app,
        "GET",
        &format!("/v1/workspaces/{workspace_id}/events"),
        None,
    )
    .await;
    assert_eq!(listed["data"][0]["event_type"], "execution.status_changed");

    let (status, _) = request(
        &app,
        "GET",
        &format!("/v1/executions/{}", Uuid::now_v7()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_of_terminal_execution_replays_and_closes() {
    let app = app();
    let workspace_id = Uuid::now_v7();

    let (_, execution) = request(
        &app,
        "POST",
        "/v1/executions",
        Some(json!({ "workspace_id": workspace_id.to_string() })),
    )
    .await;
    let execution_id = execution["id"].as_str().unwrap().to_string();

    // Two step events, then the execution completes.
    for (kind, extra) in [
        ("execution_started", json!({})),
        ("execution_completed", json!({ "output": { "ok": true } })),
    ] {
        let mut data = json!({ "type": kind, "executionId": execution_id });
        data.as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        let (status, _) = request(
            &app,
            "POST",
            &format!("/v1/workspaces/{workspace_id}/events"),
            Some(json!({
                "event_type": "execution.step",
                "actor": { "type": "system", "reason": "engine" },
                "data": data
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    request(
        &app,
        "PATCH",
        &format!("/v1/executions/{execution_id}"),
        Some(json!({ "status": "completed" })),
    )
    .await;

    // Terminal at session start: the stream replays and ends with [DONE].
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/executions/{execution_id}/stream?fromIndex=0"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers().get("x-accel-buffering").unwrap(), "no");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let payloads: Vec<&str> = text
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .collect();
    assert_eq!(payloads.len(), 3);
    let first: Value = serde_json::from_str(payloads[0]).unwrap();
    assert_eq!(first["type"], "execution_start");
    assert_eq!(first["index"], 0);
    let second: Value = serde_json::from_str(payloads[1]).unwrap();
    assert_eq!(second["type"], "execution_complete");
    assert_eq!(second["index"], 1);
    assert_eq!(payloads[2], "[DONE]");
}

#[tokio::test]
async fn stream_resumes_from_index() {
    let app = app();
    let workspace_id = Uuid::now_v7();

    let (_, execution) = request(
        &app,
        "POST",
        "/v1/executions",
        Some(json!({ "workspace_id": workspace_id.to_string() })),
    )
    .await;
    let execution_id = execution["id"].as_str().unwrap().to_string();

    for i in 0..3 {
        request(
            &app,
            "POST",
            &format!("/v1/workspaces/{workspace_id}/events"),
            Some(json!({
                "event_type": "execution.step",
                "actor": { "type": "system", "reason": "engine" },
                "data": {
                    "type": "node_output_delta",
                    "executionId": execution_id,
                    "nodeId": "node-1",
                    "delta": format!("d{i}")
                }
            })),
        )
        .await;
    }
    request(
        &app,
        "PATCH",
        &format!("/v1/executions/{execution_id}"),
        Some(json!({ "status": "cancelled" })),
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/executions/{execution_id}/stream?fromIndex=2"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let indexes: Vec<i64> = text
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .filter(|p| *p != "[DONE]")
        .map(|p| serde_json::from_str::<Value>(p).unwrap()["index"].as_i64().unwrap())
        .collect();
    assert_eq!(indexes, vec![2]);
}

#[tokio::test]
async fn stream_of_unknown_execution_is_404() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/executions/{}/stream", Uuid::now_v7()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
