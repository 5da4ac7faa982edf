// PostgreSQL-backed event log and execution store
//
// Sequence numbers are assigned inside the INSERT so the number and the
// row become visible atomically; the UNIQUE (workspace_id,
// sequence_number) constraint backstops the assignment.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::*;

type Result<T> = std::result::Result<T, StorageError>;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Run schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ============================================
    // Events (append-only log)
    // ============================================

    pub async fn append_event(&self, input: CreateEventRow) -> Result<EventRow> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id)
            VALUES ($1, $2, COALESCE((SELECT MAX(sequence_number) + 1 FROM events WHERE workspace_id = $2), 1), $3, $4, $5, $6, $7, $8)
            RETURNING id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.workspace_id)
        .bind(&input.event_type)
        .bind(&input.actor)
        .bind(&input.data)
        .bind(input.version)
        .bind(&input.entity_type)
        .bind(input.entity_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Append a batch as a single transaction; assigned sequence numbers
    /// are contiguous and follow array order.
    pub async fn append_events(&self, inputs: Vec<CreateEventRow>) -> Result<Vec<EventRow>> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(inputs.len());

        for input in inputs {
            let row = sqlx::query_as::<_, EventRow>(
                r#"
                INSERT INTO events (id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id)
                VALUES ($1, $2, COALESCE((SELECT MAX(sequence_number) + 1 FROM events WHERE workspace_id = $2), 1), $3, $4, $5, $6, $7, $8)
                RETURNING id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id, created_at
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(input.workspace_id)
            .bind(&input.event_type)
            .bind(&input.actor)
            .bind(&input.data)
            .bind(input.version)
            .bind(&input.entity_type)
            .bind(input.entity_id)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        tx.commit().await?;
        Ok(rows)
    }

    pub async fn events_after(
        &self,
        workspace_id: Uuid,
        after_sequence: i64,
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let rows = if let Some(limit) = limit {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id, created_at
                FROM events
                WHERE workspace_id = $1 AND sequence_number > $2
                ORDER BY sequence_number ASC
                LIMIT $3
                "#,
            )
            .bind(workspace_id)
            .bind(after_sequence)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id, created_at
                FROM events
                WHERE workspace_id = $1 AND sequence_number > $2
                ORDER BY sequence_number ASC
                "#,
            )
            .bind(workspace_id)
            .bind(after_sequence)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows)
    }

    pub async fn events_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        after_sequence: i64,
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let rows = if let Some(limit) = limit {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id, created_at
                FROM events
                WHERE entity_type = $1 AND entity_id = $2 AND sequence_number > $3
                ORDER BY sequence_number ASC
                LIMIT $4
                "#,
            )
            .bind(entity_type)
            .bind(entity_id)
            .bind(after_sequence)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT id, workspace_id, sequence_number, event_type, actor, data, version, entity_type, entity_id, created_at
                FROM events
                WHERE entity_type = $1 AND entity_id = $2 AND sequence_number > $3
                ORDER BY sequence_number ASC
                "#,
            )
            .bind(entity_type)
            .bind(entity_id)
            .bind(after_sequence)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows)
    }

    pub async fn latest_sequence(&self, workspace_id: Uuid) -> Result<i64> {
        let (latest,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(MAX(sequence_number), 0)
            FROM events
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(latest)
    }

    // ============================================
    // Executions (status records for stream sessions)
    // ============================================

    pub async fn create_execution(&self, input: CreateExecutionRow) -> Result<ExecutionRow> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            INSERT INTO executions (id, workspace_id, flow_id, block_id, status, input)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING id, workspace_id, flow_id, block_id, status, input, output, error, started_at, completed_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.workspace_id)
        .bind(input.flow_id)
        .bind(input.block_id)
        .bind(&input.input)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT id, workspace_id, flow_id, block_id, status, input, output, error, started_at, completed_at, created_at
            FROM executions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_execution(
        &self,
        id: Uuid,
        input: UpdateExecutionRow,
    ) -> Result<Option<ExecutionRow>> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            UPDATE executions
            SET
                status = COALESCE($2, status),
                output = COALESCE($3, output),
                error = COALESCE($4, error),
                started_at = COALESCE($5, started_at),
                completed_at = COALESCE($6, completed_at)
            WHERE id = $1
            RETURNING id, workspace_id, flow_id, block_id, status, input, output, error, started_at, completed_at, created_at
            "#,
        )
        .bind(id)
        .bind(&input.status)
        .bind(&input.output)
        .bind(&input.error)
        .bind(input.started_at)
        .bind(input.completed_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
