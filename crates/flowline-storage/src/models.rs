// Row types for the events and executions tables

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use flowline_core::{Actor, EntityType, Event, EventType, Execution, ExecutionStatus, NewEvent};

use crate::error::StorageError;

/// A row in the events table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub sequence_number: i64,
    pub event_type: String,
    pub actor: Value,
    pub data: Value,
    pub version: i32,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EventRow {
    /// Decode the row into the domain Event.
    pub fn into_event(self) -> Result<Event, StorageError> {
        let event_type: EventType = self.event_type.parse().map_err(StorageError::decode)?;
        let actor: Actor = serde_json::from_value(self.actor)
            .map_err(|e| StorageError::decode(format!("actor: {}", e)))?;
        let entity_type = self
            .entity_type
            .as_deref()
            .map(str::parse::<EntityType>)
            .transpose()
            .map_err(StorageError::decode)?;

        Ok(Event {
            id: self.id,
            event_type,
            workspace_id: self.workspace_id,
            actor,
            data: self.data,
            timestamp: self.created_at,
            version: self.version,
            sequence_number: self.sequence_number,
            entity_type,
            entity_id: self.entity_id,
        })
    }
}

/// Input for inserting one event. Id, sequence number, and timestamp are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct CreateEventRow {
    pub workspace_id: Uuid,
    pub event_type: String,
    pub actor: Value,
    pub data: Value,
    pub version: i32,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

impl CreateEventRow {
    pub fn from_new_event(event: &NewEvent) -> Result<Self, StorageError> {
        let actor = serde_json::to_value(&event.actor)
            .map_err(|e| StorageError::decode(format!("actor: {}", e)))?;
        let entity = event.entity();

        Ok(Self {
            workspace_id: event.workspace_id,
            event_type: event.event_type.as_str().to_string(),
            actor,
            data: event.data.clone(),
            version: event.version,
            entity_type: entity.map(|(t, _)| t.as_str().to_string()),
            entity_id: entity.map(|(_, id)| id),
        })
    }
}

/// A row in the executions table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub flow_id: Option<Uuid>,
    pub block_id: Option<Uuid>,
    pub status: String,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionRow {
    pub fn into_execution(self) -> Result<Execution, StorageError> {
        let status: ExecutionStatus = self.status.parse().map_err(StorageError::decode)?;
        Ok(Execution {
            id: self.id,
            workspace_id: self.workspace_id,
            flow_id: self.flow_id,
            block_id: self.block_id,
            status,
            input: self.input,
            output: self.output,
            error: self.error,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
        })
    }
}

/// Input for creating an execution record.
#[derive(Debug, Clone)]
pub struct CreateExecutionRow {
    pub workspace_id: Uuid,
    pub flow_id: Option<Uuid>,
    pub block_id: Option<Uuid>,
    pub input: Option<Value>,
}

/// Partial update for an execution record; None leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateExecutionRow {
    pub status: Option<String>,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
