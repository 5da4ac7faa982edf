// Live execution event streaming (SSE)
//
// One StreamSession per connected client. The session replays historical
// events from the log starting at the client's offset, then polls for new
// ones with exponential backoff, heartbeats, and a hard lifetime cap.
// Frames are emitted strictly in ascending index order per tracked node.
//
// The whole session lives inside the response body stream: when the
// client disconnects, axum drops the stream, which drops the session
// future and cancels any pending delay. No timers outlive the session.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use utoipa::IntoParams;
use uuid::Uuid;

use flowline_core::{EventError, EventType, ExecutionStatus, StepEvent};
use flowline_protocol::events::{done_frame, heartbeat_frame};
use flowline_protocol::{EventMapper, StreamEvent, StreamEventKind};
use flowline_storage::{EventRow, EventStore};

/// Fast poll floor, used right after events were found
const POLL_FLOOR: Duration = Duration::from_millis(150);
/// Poll ceiling during long idle stretches
const POLL_CEILING: Duration = Duration::from_secs(2);
/// Idle multiplier between the floor and the ceiling
const POLL_FACTOR: f64 = 1.5;
/// Emit a comment frame when nothing was sent for this long, to defeat
/// intermediary idle-connection timeouts
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
/// Hard cap on one connection; clients reconnect with their last index
const MAX_SESSION_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// App state for stream routes
#[derive(Clone)]
pub struct AppState {
    pub store: EventStore,
}

/// Query parameters for the stream endpoint
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    /// The client's last-seen index plus one; events before it are not
    /// re-sent after a reconnect
    #[serde(default)]
    pub from_index: i64,
}

/// Create stream routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/executions/:execution_id/stream", get(stream_execution))
        .with_state(state)
}

/// GET /v1/executions/{execution_id}/stream - Stream execution events
#[utoipa::path(
    get,
    path = "/v1/executions/{execution_id}/stream",
    params(
        ("execution_id" = Uuid, Path, description = "Execution ID"),
        StreamQuery
    ),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 404, description = "Execution not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "streams"
)]
pub async fn stream_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, StatusCode> {
    // Verify the execution exists before holding a connection open
    state
        .store
        .get_execution(execution_id)
        .await
        .map_err(|e| {
            tracing::error!(execution_id = %execution_id, error = %e, "failed to get execution");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    tracing::info!(
        execution_id = %execution_id,
        from_index = query.from_index,
        "starting execution stream"
    );

    let session = StreamSession::new(state.store.clone(), execution_id, query.from_index);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        // Disable intermediary response buffering so frames flush per poll
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(session.into_stream()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(response)
}

// ============================================
// Backoff
// ============================================

/// Exponential poll backoff with instant reset on activity.
#[derive(Debug)]
pub struct Backoff {
    current: Duration,
    floor: Duration,
    ceiling: Duration,
    factor: f64,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration, factor: f64) -> Self {
        Self {
            current: floor,
            floor,
            ceiling,
            factor,
        }
    }

    /// Current delay before the next poll.
    pub fn delay(&self) -> Duration {
        self.current
    }

    /// A poll found events: snap back to the floor.
    pub fn on_activity(&mut self) {
        self.current = self.floor;
    }

    /// A poll found nothing: lengthen the delay up to the ceiling.
    pub fn on_idle(&mut self) {
        self.current = self.current.mul_f64(self.factor).min(self.ceiling);
    }
}

// ============================================
// Session state machine
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Terminal execution status; `[DONE]` was emitted
    Complete,
    /// Connection lifetime cap; a reconnect instruction was emitted
    Timeout,
    /// Transport-level disconnect observed as the session being dropped
    ClientAbort,
    /// Persistence failure surfaced by erroring the stream
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Replaying,
    LivePolling,
    Closed(CloseReason),
}

/// One client's view of one execution's event stream.
pub struct StreamSession {
    store: EventStore,
    mapper: EventMapper,
    execution_id: Uuid,
    from_index: i64,
    state: SessionState,
    /// Log cursor: highest sequence number already scanned
    cursor: i64,
    /// Next wire index to assign (count of step events scanned so far)
    next_index: i64,
    /// Highest index sent per node, so polling never re-emits
    last_sent: HashMap<String, i64>,
    backoff: Backoff,
    started_at: Instant,
    last_frame_at: Instant,
}

impl StreamSession {
    pub fn new(store: EventStore, execution_id: Uuid, from_index: i64) -> Self {
        let now = Instant::now();
        Self {
            store,
            mapper: EventMapper::new(),
            execution_id,
            from_index: from_index.max(0),
            state: SessionState::Replaying,
            cursor: 0,
            next_index: 0,
            last_sent: HashMap::new(),
            backoff: Backoff::new(POLL_FLOOR, POLL_CEILING, POLL_FACTOR),
            started_at: now,
            last_frame_at: now,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn poll_delay(&self) -> Duration {
        self.backoff.delay()
    }

    /// Run one state-machine step and return the frames to emit.
    pub async fn tick(&mut self) -> Result<Vec<String>, EventError> {
        let mut frames = match self.state {
            SessionState::Replaying => self.replay().await?,
            SessionState::LivePolling => self.poll().await?,
            SessionState::Closed(_) => Vec::new(),
        };

        if frames.is_empty()
            && !matches!(self.state, SessionState::Closed(_))
            && self.last_frame_at.elapsed() >= HEARTBEAT_INTERVAL
        {
            frames.push(heartbeat_frame());
        }
        if !frames.is_empty() {
            self.last_frame_at = Instant::now();
        }
        Ok(frames)
    }

    /// Initial state: emit history from the client's offset, then either
    /// close (terminal execution) or switch to polling.
    async fn replay(&mut self) -> Result<Vec<String>, EventError> {
        let status = self.execution_status().await?;
        let rows = self
            .store
            .events_by_entity("execution", self.execution_id, self.cursor, None)
            .await?;
        let mut frames = self.process_rows(rows);

        if status.is_terminal() {
            // Already over: emit the sentinel and never start polling.
            frames.push(done_frame());
            self.state = SessionState::Closed(CloseReason::Complete);
        } else {
            self.state = SessionState::LivePolling;
        }
        Ok(frames)
    }

    /// Polling state: one status check plus one incremental query per
    /// tick. The delay between ticks lives in the driving stream, so the
    /// session stays cancellable between polls.
    async fn poll(&mut self) -> Result<Vec<String>, EventError> {
        if self.started_at.elapsed() >= MAX_SESSION_LIFETIME {
            // Controlled reconnect, not a failure: no sentinel, the
            // client resumes from its last index.
            tracing::info!(
                execution_id = %self.execution_id,
                cause = %EventError::LifetimeExceeded,
                "instructing client to reconnect"
            );
            let frames = vec![self.reconnect_frame()];
            self.state = SessionState::Closed(CloseReason::Timeout);
            return Ok(frames);
        }

        let status = self.execution_status().await?;
        let rows = self
            .store
            .events_by_entity("execution", self.execution_id, self.cursor, None)
            .await?;
        let found = !rows.is_empty();
        let mut frames = self.process_rows(rows);

        if found {
            self.backoff.on_activity();
        } else {
            self.backoff.on_idle();
        }

        if status.is_terminal() {
            frames.push(done_frame());
            self.state = SessionState::Closed(CloseReason::Complete);
        }
        Ok(frames)
    }

    async fn execution_status(&self) -> Result<ExecutionStatus, EventError> {
        let row = self
            .store
            .get_execution(self.execution_id)
            .await?
            .ok_or_else(|| EventError::persistence("execution disappeared mid-stream"))?;
        row.status.parse().map_err(EventError::parse)
    }

    /// Assign wire indexes and render frames for a run of log rows.
    ///
    /// Indexes count step events in log order, independent of whether a
    /// given event maps to a wire frame, so an index means the same thing
    /// on every replay. Rows below the client's offset, and rows whose
    /// index was already sent for their node, advance the cursors without
    /// emitting.
    fn process_rows(&mut self, rows: Vec<EventRow>) -> Vec<String> {
        let mut frames = Vec::new();
        for row in rows {
            self.cursor = self.cursor.max(row.sequence_number);
            if row.event_type != EventType::ExecutionStep.as_str() {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;

            let step: StepEvent = match serde_json::from_value(row.data) {
                Ok(step) => step,
                Err(e) => {
                    tracing::warn!(
                        execution_id = %self.execution_id,
                        sequence_number = row.sequence_number,
                        error = %e,
                        "skipping undecodable step event"
                    );
                    continue;
                }
            };

            let node_key = step.node_id().unwrap_or("").to_string();
            let already_sent = self
                .last_sent
                .get(&node_key)
                .is_some_and(|last| index <= *last);
            if index < self.from_index || already_sent {
                self.note_sent(node_key, index);
                continue;
            }

            if let Some(wire) = self.mapper.to_wire(&step, index, row.created_at) {
                frames.push(wire.to_frame());
            }
            self.note_sent(node_key, index);
        }
        frames
    }

    fn note_sent(&mut self, node_key: String, index: i64) {
        let entry = self.last_sent.entry(node_key).or_insert(-1);
        *entry = (*entry).max(index);
    }

    fn reconnect_frame(&self) -> String {
        StreamEvent {
            index: self.next_index,
            kind: StreamEventKind::Reconnect,
            execution_id: self.execution_id,
            node_id: None,
            data: json!({ "fromIndex": self.next_index }),
            timestamp: Utc::now(),
        }
        .to_frame()
    }

    /// Drive the session as a frame stream. Dropping the stream cancels
    /// the pending poll delay and tears the session down.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, EventError>> {
        stream::unfold(self, |mut session| async move {
            if let SessionState::Closed(_) = session.state {
                return None;
            }
            if session.state == SessionState::LivePolling {
                tokio::time::sleep(session.poll_delay()).await;
            }
            match session.tick().await {
                Ok(frames) => {
                    let items: Vec<Result<String, EventError>> =
                        frames.into_iter().map(Ok).collect();
                    Some((stream::iter(items), session))
                }
                Err(e) => {
                    tracing::error!(
                        execution_id = %session.execution_id,
                        error = %e,
                        "stream session failed"
                    );
                    session.state = SessionState::Closed(CloseReason::Error);
                    Some((stream::iter(vec![Err(e)]), session))
                }
            }
        })
        .flatten()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let reason = match self.state {
            SessionState::Closed(reason) => reason,
            // Dropped while replaying or polling: the transport aborted,
            // which is normal termination, not a failure.
            _ => {
                tracing::debug!(
                    execution_id = %self.execution_id,
                    cause = %EventError::TransportAbort,
                    "session dropped by transport"
                );
                CloseReason::ClientAbort
            }
        };
        tracing::info!(
            execution_id = %self.execution_id,
            reason = ?reason,
            frames_indexed = self.next_index,
            "stream session closed"
        );
    }
}
