// Execution service
//
// Executions are driven by the external execution engine; this service
// keeps their status records and turns status transitions into durable
// domain events so the workspace log reflects execution history.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use flowline_core::{Actor, EventError, EventType, Execution, ExecutionStatus, NewEvent};
use flowline_storage::{CreateExecutionRow, EventStore, UpdateExecutionRow};

use super::EventService;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateExecutionRequest {
    pub workspace_id: Uuid,
    pub flow_id: Option<Uuid>,
    pub block_id: Option<Uuid>,
    pub input: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateExecutionRequest {
    pub status: Option<ExecutionStatus>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

pub struct ExecutionService {
    store: EventStore,
    events: Arc<EventService>,
}

impl ExecutionService {
    pub fn new(store: EventStore, events: Arc<EventService>) -> Self {
        Self { store, events }
    }

    pub async fn create(&self, input: CreateExecutionRequest) -> Result<Execution, EventError> {
        let row = self
            .store
            .create_execution(CreateExecutionRow {
                workspace_id: input.workspace_id,
                flow_id: input.flow_id,
                block_id: input.block_id,
                input: input.input,
            })
            .await?;
        Ok(row.into_execution()?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Execution>, EventError> {
        match self.store.get_execution(id).await? {
            Some(row) => Ok(Some(row.into_execution()?)),
            None => Ok(None),
        }
    }

    /// Apply a partial update from the engine. Status transitions stamp
    /// started_at/completed_at and are recorded as
    /// `execution.status_changed` domain events.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateExecutionRequest,
    ) -> Result<Option<Execution>, EventError> {
        let Some(previous) = self.store.get_execution(id).await? else {
            return Ok(None);
        };
        let previous = previous.into_execution()?;

        let now = Utc::now();
        let update = UpdateExecutionRow {
            status: input.status.map(|s| s.as_str().to_string()),
            output: input.output,
            error: input.error,
            started_at: match input.status {
                Some(ExecutionStatus::Running) if previous.started_at.is_none() => Some(now),
                _ => None,
            },
            completed_at: match input.status {
                Some(status) if status.is_terminal() => Some(now),
                _ => None,
            },
        };

        let Some(row) = self.store.update_execution(id, update).await? else {
            return Ok(None);
        };
        let execution = row.into_execution()?;

        if execution.status != previous.status {
            self.events
                .emit(NewEvent::new(
                    EventType::ExecutionStatusChanged,
                    execution.workspace_id,
                    Actor::system("execution status transition"),
                    json!({
                        "executionId": execution.id.to_string(),
                        "status": execution.status.as_str(),
                        "previousStatus": previous.status.as_str(),
                    }),
                ))
                .await?;
        }

        Ok(Some(execution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::EventBus;

    fn services() -> (Arc<EventService>, ExecutionService) {
        let store = EventStore::in_memory();
        let events = Arc::new(EventService::new(store.clone(), EventBus::new()));
        let executions = ExecutionService::new(store, Arc::clone(&events));
        (events, executions)
    }

    #[tokio::test]
    async fn create_starts_pending() {
        let (_, executions) = services();
        let execution = executions
            .create(CreateExecutionRequest {
                workspace_id: Uuid::now_v7(),
                flow_id: Some(Uuid::now_v7()),
                block_id: None,
                input: Some(json!({ "message": "hi" })),
            })
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert!(execution.started_at.is_none());
    }

    #[tokio::test]
    async fn status_transitions_stamp_times_and_emit_events() {
        let (events, executions) = services();
        let workspace_id = Uuid::now_v7();
        let execution = executions
            .create(CreateExecutionRequest {
                workspace_id,
                flow_id: None,
                block_id: Some(Uuid::now_v7()),
                input: None,
            })
            .await
            .unwrap();

        let running = executions
            .update(
                execution.id,
                UpdateExecutionRequest {
                    status: Some(ExecutionStatus::Running),
                    output: None,
                    error: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        let completed = executions
            .update(
                execution.id,
                UpdateExecutionRequest {
                    status: Some(ExecutionStatus::Completed),
                    output: Some(json!({ "answer": 42 })),
                    error: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(completed.completed_at.is_some());

        let log = events.list(workspace_id, 0, None).await.unwrap();
        let kinds: Vec<_> = log.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                EventType::ExecutionStatusChanged,
                EventType::ExecutionStatusChanged
            ]
        );
        assert_eq!(log[1].data["status"], "completed");
        assert_eq!(log[1].data["previousStatus"], "running");
        assert_eq!(log[1].entity_id, Some(execution.id));
    }

    #[tokio::test]
    async fn update_without_status_change_emits_nothing() {
        let (events, executions) = services();
        let workspace_id = Uuid::now_v7();
        let execution = executions
            .create(CreateExecutionRequest {
                workspace_id,
                flow_id: None,
                block_id: None,
                input: None,
            })
            .await
            .unwrap();

        executions
            .update(
                execution.id,
                UpdateExecutionRequest {
                    status: None,
                    output: Some(json!({ "partial": true })),
                    error: None,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert!(events.list(workspace_id, 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_unknown_execution_is_none() {
        let (_, executions) = services();
        let result = executions
            .update(
                Uuid::now_v7(),
                UpdateExecutionRequest {
                    status: Some(ExecutionStatus::Running),
                    output: None,
                    error: None,
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
