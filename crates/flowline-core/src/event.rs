// Event entity type
//
// An Event is an immutable, sequence-numbered record of something that
// happened in a workspace. The sequence number is assigned by the log at
// insertion time and is the sole ordering key for replay and catch-up;
// the timestamp is advisory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{Actor, EntityType, EventType};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// A stored event. Immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Event {
    pub id: Uuid,
    pub event_type: EventType,
    pub workspace_id: Uuid,
    pub actor: Actor,
    /// Type-specific payload; shape is determined by `event_type`
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    /// Payload schema version, for forward-compatible payload evolution
    pub version: i32,
    /// Strictly increasing and gapless within a workspace
    pub sequence_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
}

/// Input to `append`: an event before the log has assigned
/// id, sequence number, and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NewEvent {
    pub event_type: EventType,
    pub workspace_id: Uuid,
    pub actor: Actor,
    pub data: Value,
    #[serde(default = "default_version")]
    pub version: i32,
}

fn default_version() -> i32 {
    1
}

impl NewEvent {
    pub fn new(event_type: EventType, workspace_id: Uuid, actor: Actor, data: Value) -> Self {
        Self {
            event_type,
            workspace_id,
            actor,
            data,
            version: 1,
        }
    }

    /// The derived (entity type, entity id) pair for this event, if any.
    pub fn entity(&self) -> Option<(EntityType, Uuid)> {
        derive_entity(self.event_type, &self.data)
    }
}

/// Derive the secondary entity index from an event payload.
///
/// Execution events attribute to the execution even when the payload also
/// names the block a step ran on; all other kinds attribute to the first
/// recognized id key.
pub fn derive_entity(event_type: EventType, data: &Value) -> Option<(EntityType, Uuid)> {
    fn id_field(data: &Value, key: &str) -> Option<Uuid> {
        data.get(key)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    let keys: &[(&str, EntityType)] = match event_type {
        EventType::ExecutionStep | EventType::ExecutionStatusChanged => {
            &[("executionId", EntityType::Execution)]
        }
        _ => &[
            ("blockId", EntityType::Block),
            ("flowId", EntityType::Flow),
            ("connectionId", EntityType::Connection),
            ("toolId", EntityType::Tool),
            ("executionId", EntityType::Execution),
        ],
    };

    keys.iter()
        .find_map(|(key, ty)| id_field(data, key).map(|id| (*ty, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_block_entity_from_payload() {
        let id = Uuid::now_v7();
        let entity = derive_entity(
            EventType::BlockUpdated,
            &json!({ "blockId": id.to_string(), "name": "summarizer" }),
        );
        assert_eq!(entity, Some((EntityType::Block, id)));
    }

    #[test]
    fn execution_step_attributes_to_execution_over_block() {
        let execution_id = Uuid::now_v7();
        let block_id = Uuid::now_v7();
        let entity = derive_entity(
            EventType::ExecutionStep,
            &json!({ "executionId": execution_id.to_string(), "blockId": block_id.to_string() }),
        );
        assert_eq!(entity, Some((EntityType::Execution, execution_id)));
    }

    #[test]
    fn underivable_payload_yields_no_entity() {
        assert_eq!(derive_entity(EventType::FlowCreated, &json!({ "name": "x" })), None);
        assert_eq!(
            derive_entity(EventType::FlowCreated, &json!({ "flowId": "not-a-uuid" })),
            None
        );
    }

    #[test]
    fn new_event_defaults_to_version_1() {
        let parsed: NewEvent = serde_json::from_value(json!({
            "event_type": "flow.created",
            "workspace_id": Uuid::now_v7().to_string(),
            "actor": { "type": "system", "reason": "seed" },
            "data": {}
        }))
        .unwrap();
        assert_eq!(parsed.version, 1);
    }
}
