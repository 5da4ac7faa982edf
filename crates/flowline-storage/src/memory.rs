// In-memory storage implementation for dev mode
// Decision: Use parking_lot for thread-safe access
// Decision: UUIDs generated via uuid v7 (time-ordered)
//
// Provides a PostgreSQL-compatible API backed by in-memory maps, allowing
// the API server and the test suite to run without a database. All data
// is lost on restart; durability in dev mode is explicitly not a goal.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::*;

type Result<T> = std::result::Result<T, StorageError>;

#[derive(Default)]
pub struct InMemoryDatabase {
    events: RwLock<HashMap<Uuid, EventRow>>,
    executions: RwLock<HashMap<Uuid, ExecutionRow>>,
    // Event sequence counter per workspace
    sequences: RwLock<HashMap<Uuid, i64>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn insert_event(&self, input: CreateEventRow, sequence_number: i64) -> EventRow {
        let row = EventRow {
            id: Uuid::now_v7(),
            workspace_id: input.workspace_id,
            sequence_number,
            event_type: input.event_type,
            actor: input.actor,
            data: input.data,
            version: input.version,
            entity_type: input.entity_type,
            entity_id: input.entity_id,
            created_at: Self::now(),
        };
        self.events.write().insert(row.id, row.clone());
        row
    }

    // ============================================
    // Events
    // ============================================

    pub async fn append_event(&self, input: CreateEventRow) -> Result<EventRow> {
        // Get next sequence for this workspace
        let sequence_number = {
            let mut sequences = self.sequences.write();
            let seq = sequences.entry(input.workspace_id).or_insert(0);
            *seq += 1;
            *seq
        };
        Ok(self.insert_event(input, sequence_number))
    }

    pub async fn append_events(&self, inputs: Vec<CreateEventRow>) -> Result<Vec<EventRow>> {
        // Hold the counter lock across the batch so the run is contiguous.
        let mut rows = Vec::with_capacity(inputs.len());
        let mut sequences = self.sequences.write();
        for input in inputs {
            let seq = sequences.entry(input.workspace_id).or_insert(0);
            *seq += 1;
            let sequence_number = *seq;
            rows.push(self.insert_event(input, sequence_number));
        }
        Ok(rows)
    }

    pub async fn events_after(
        &self,
        workspace_id: Uuid,
        after_sequence: i64,
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let events = self.events.read();
        let mut result: Vec<_> = events
            .values()
            .filter(|e| e.workspace_id == workspace_id && e.sequence_number > after_sequence)
            .cloned()
            .collect();

        result.sort_by_key(|e| e.sequence_number);
        if let Some(limit) = limit {
            result.truncate(limit.max(0) as usize);
        }
        Ok(result)
    }

    pub async fn events_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        after_sequence: i64,
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let events = self.events.read();
        let mut result: Vec<_> = events
            .values()
            .filter(|e| {
                e.entity_type.as_deref() == Some(entity_type)
                    && e.entity_id == Some(entity_id)
                    && e.sequence_number > after_sequence
            })
            .cloned()
            .collect();

        result.sort_by_key(|e| e.sequence_number);
        if let Some(limit) = limit {
            result.truncate(limit.max(0) as usize);
        }
        Ok(result)
    }

    pub async fn latest_sequence(&self, workspace_id: Uuid) -> Result<i64> {
        Ok(self
            .sequences
            .read()
            .get(&workspace_id)
            .copied()
            .unwrap_or(0))
    }

    // ============================================
    // Executions
    // ============================================

    pub async fn create_execution(&self, input: CreateExecutionRow) -> Result<ExecutionRow> {
        let row = ExecutionRow {
            id: Uuid::now_v7(),
            workspace_id: input.workspace_id,
            flow_id: input.flow_id,
            block_id: input.block_id,
            status: "pending".to_string(),
            input: input.input,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: Self::now(),
        };
        self.executions.write().insert(row.id, row.clone());
        Ok(row)
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>> {
        Ok(self.executions.read().get(&id).cloned())
    }

    pub async fn update_execution(
        &self,
        id: Uuid,
        input: UpdateExecutionRow,
    ) -> Result<Option<ExecutionRow>> {
        let mut executions = self.executions.write();
        if let Some(execution) = executions.get_mut(&id) {
            if let Some(status) = input.status {
                execution.status = status;
            }
            if let Some(output) = input.output {
                execution.output = Some(output);
            }
            if let Some(error) = input.error {
                execution.error = Some(error);
            }
            if let Some(started_at) = input.started_at {
                execution.started_at = Some(started_at);
            }
            if let Some(completed_at) = input.completed_at {
                execution.completed_at = Some(completed_at);
            }
            return Ok(Some(execution.clone()));
        }
        Ok(None)
    }
}
