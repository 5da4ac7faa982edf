// Storage backend abstraction
// Decision: Use enum dispatch for simplicity over trait objects
//
// A unified EventStore that works with either PostgreSQL (production) or
// in-memory (dev mode) storage. Both backends give read-your-writes
// within the process: a returned sequence number is immediately visible
// to subsequent queries.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::StorageError;
use crate::memory::InMemoryDatabase;
use crate::models::*;
use crate::postgres::Database;

type Result<T> = std::result::Result<T, StorageError>;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum EventStore {
    /// PostgreSQL database (production)
    Postgres(Database),
    /// In-memory database (dev mode)
    InMemory(Arc<InMemoryDatabase>),
}

impl EventStore {
    /// Create a PostgreSQL storage backend from a database URL
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let db = Database::from_url(database_url).await?;
        db.migrate().await?;
        tracing::info!("database migrations applied");
        Ok(Self::Postgres(db))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryDatabase::new()))
    }

    /// Build from the environment: DATABASE_URL selects PostgreSQL,
    /// absence selects in-memory dev mode.
    pub async fn from_env() -> Result<Self> {
        match std::env::var("DATABASE_URL") {
            Ok(url) => Self::postgres(&url).await,
            Err(_) => Ok(Self::in_memory()),
        }
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    // ============================================
    // Events
    // ============================================

    /// Append one event: assigns id, timestamp, and the next sequence
    /// number for the event's workspace atomically with the insert.
    pub async fn append_event(&self, input: CreateEventRow) -> Result<EventRow> {
        match self {
            Self::Postgres(db) => db.append_event(input).await,
            Self::InMemory(db) => db.append_event(input).await,
        }
    }

    /// Append a batch as a single unit; sequence numbers are contiguous
    /// and in array order.
    pub async fn append_events(&self, inputs: Vec<CreateEventRow>) -> Result<Vec<EventRow>> {
        match self {
            Self::Postgres(db) => db.append_events(inputs).await,
            Self::InMemory(db) => db.append_events(inputs).await,
        }
    }

    /// The catch-up primitive: everything after a sequence number,
    /// ascending.
    pub async fn events_after(
        &self,
        workspace_id: Uuid,
        after_sequence: i64,
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        match self {
            Self::Postgres(db) => db.events_after(workspace_id, after_sequence, limit).await,
            Self::InMemory(db) => db.events_after(workspace_id, after_sequence, limit).await,
        }
    }

    pub async fn events_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        after_sequence: i64,
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        match self {
            Self::Postgres(db) => {
                db.events_by_entity(entity_type, entity_id, after_sequence, limit)
                    .await
            }
            Self::InMemory(db) => {
                db.events_by_entity(entity_type, entity_id, after_sequence, limit)
                    .await
            }
        }
    }

    /// Latest sequence number for a workspace, 0 when empty. Lets new
    /// subscribers establish an offset without replaying history.
    pub async fn latest_sequence(&self, workspace_id: Uuid) -> Result<i64> {
        match self {
            Self::Postgres(db) => db.latest_sequence(workspace_id).await,
            Self::InMemory(db) => db.latest_sequence(workspace_id).await,
        }
    }

    // ============================================
    // Executions
    // ============================================

    pub async fn create_execution(&self, input: CreateExecutionRow) -> Result<ExecutionRow> {
        match self {
            Self::Postgres(db) => db.create_execution(input).await,
            Self::InMemory(db) => db.create_execution(input).await,
        }
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>> {
        match self {
            Self::Postgres(db) => db.get_execution(id).await,
            Self::InMemory(db) => db.get_execution(id).await,
        }
    }

    pub async fn update_execution(
        &self,
        id: Uuid,
        input: UpdateExecutionRow,
    ) -> Result<Option<ExecutionRow>> {
        match self {
            Self::Postgres(db) => db.update_execution(id, input).await,
            Self::InMemory(db) => db.update_execution(id, input).await,
        }
    }
}
