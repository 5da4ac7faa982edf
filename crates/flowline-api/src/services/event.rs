// Event service: the write path used by producers
//
// Stores an event durably via the log, then publishes it on the bus when
// anyone is subscribed. The subscriber check is a cost short-circuit, not
// a correctness requirement: the log is durable either way, and live
// listeners can always catch up from their last sequence number.

use flowline_core::{Event, EventBus, EventError, NewEvent};
use flowline_storage::{CreateEventRow, EventStore};
use uuid::Uuid;

pub struct EventService {
    store: EventStore,
    bus: EventBus,
}

impl EventService {
    pub fn new(store: EventStore, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Store one event and fan it out to live subscribers.
    pub async fn emit(&self, event: NewEvent) -> Result<Event, EventError> {
        let workspace_id = event.workspace_id;
        let row = self
            .store
            .append_event(CreateEventRow::from_new_event(&event)?)
            .await?;
        let stored = row.into_event()?;

        tracing::debug!(
            workspace_id = %workspace_id,
            event_type = %stored.event_type,
            sequence_number = stored.sequence_number,
            "event stored"
        );

        if self.bus.has_workspace_subscribers(workspace_id) {
            self.bus.publish(workspace_id, &stored);
        }
        Ok(stored)
    }

    /// Store a batch as a single unit, then fan out each stored event.
    pub async fn emit_batch(&self, events: Vec<NewEvent>) -> Result<Vec<Event>, EventError> {
        let inputs = events
            .iter()
            .map(CreateEventRow::from_new_event)
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self.store.append_events(inputs).await?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(row.into_event()?);
        }

        for event in &stored {
            if self.bus.has_workspace_subscribers(event.workspace_id) {
                self.bus.publish(event.workspace_id, event);
            }
        }
        Ok(stored)
    }

    /// Catch-up listing: everything after a sequence number, ascending.
    pub async fn list(
        &self,
        workspace_id: Uuid,
        after_sequence: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Event>, EventError> {
        let rows = self
            .store
            .events_after(workspace_id, after_sequence, limit)
            .await?;
        rows.into_iter()
            .map(|row| row.into_event().map_err(EventError::from))
            .collect()
    }

    pub async fn latest_sequence(&self, workspace_id: Uuid) -> Result<i64, EventError> {
        Ok(self.store.latest_sequence(workspace_id).await?)
    }
}
