// Closed event-kind set and the actor tagged union
//
// EventType is versioned as a whole: adding a kind is a schema change for
// consumers, so the set is deliberately closed and matched exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Closed set of domain event kinds.
///
/// The serialized names are the wire names stored in the events table and
/// exposed over the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum EventType {
    #[serde(rename = "block.created")]
    BlockCreated,
    #[serde(rename = "block.updated")]
    BlockUpdated,
    #[serde(rename = "block.deleted")]
    BlockDeleted,
    #[serde(rename = "flow.created")]
    FlowCreated,
    #[serde(rename = "flow.updated")]
    FlowUpdated,
    #[serde(rename = "flow.deleted")]
    FlowDeleted,
    #[serde(rename = "connection.created")]
    ConnectionCreated,
    #[serde(rename = "connection.updated")]
    ConnectionUpdated,
    #[serde(rename = "connection.deleted")]
    ConnectionDeleted,
    #[serde(rename = "tool.created")]
    ToolCreated,
    #[serde(rename = "tool.updated")]
    ToolUpdated,
    #[serde(rename = "tool.deleted")]
    ToolDeleted,
    #[serde(rename = "execution.step")]
    ExecutionStep,
    #[serde(rename = "execution.status_changed")]
    ExecutionStatusChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BlockCreated => "block.created",
            EventType::BlockUpdated => "block.updated",
            EventType::BlockDeleted => "block.deleted",
            EventType::FlowCreated => "flow.created",
            EventType::FlowUpdated => "flow.updated",
            EventType::FlowDeleted => "flow.deleted",
            EventType::ConnectionCreated => "connection.created",
            EventType::ConnectionUpdated => "connection.updated",
            EventType::ConnectionDeleted => "connection.deleted",
            EventType::ToolCreated => "tool.created",
            EventType::ToolUpdated => "tool.updated",
            EventType::ToolDeleted => "tool.deleted",
            EventType::ExecutionStep => "execution.step",
            EventType::ExecutionStatusChanged => "execution.status_changed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block.created" => Ok(EventType::BlockCreated),
            "block.updated" => Ok(EventType::BlockUpdated),
            "block.deleted" => Ok(EventType::BlockDeleted),
            "flow.created" => Ok(EventType::FlowCreated),
            "flow.updated" => Ok(EventType::FlowUpdated),
            "flow.deleted" => Ok(EventType::FlowDeleted),
            "connection.created" => Ok(EventType::ConnectionCreated),
            "connection.updated" => Ok(EventType::ConnectionUpdated),
            "connection.deleted" => Ok(EventType::ConnectionDeleted),
            "tool.created" => Ok(EventType::ToolCreated),
            "tool.updated" => Ok(EventType::ToolUpdated),
            "tool.deleted" => Ok(EventType::ToolDeleted),
            "execution.step" => Ok(EventType::ExecutionStep),
            "execution.status_changed" => Ok(EventType::ExecutionStatusChanged),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

/// Who caused an event. Exactly one variant is active; the discriminant is
/// serialized as a `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum Actor {
    /// A human user acting through the UI or API
    User { user_id: Uuid },
    /// An autonomous agent execution
    Agent { agent_id: Uuid, name: String },
    /// The system itself (scheduled jobs, status reconciliation, ...)
    System { reason: String },
}

impl Actor {
    pub fn system(reason: impl Into<String>) -> Self {
        Actor::System {
            reason: reason.into(),
        }
    }

    pub fn user(user_id: Uuid) -> Self {
        Actor::User { user_id }
    }

    pub fn agent(agent_id: Uuid, name: impl Into<String>) -> Self {
        Actor::Agent {
            agent_id,
            name: name.into(),
        }
    }
}

/// Entity kinds an event can be attributed to via payload inspection.
/// Used purely as a secondary index, never as part of event identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum EntityType {
    Block,
    Flow,
    Connection,
    Tool,
    Execution,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Block => "block",
            EntityType::Flow => "flow",
            EntityType::Connection => "connection",
            EntityType::Tool => "tool",
            EntityType::Execution => "execution",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(EntityType::Block),
            "flow" => Ok(EntityType::Flow),
            "connection" => Ok(EntityType::Connection),
            "tool" => Ok(EntityType::Tool),
            "execution" => Ok(EntityType::Execution),
            other => Err(format!("unknown entity type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_wire_name() {
        let json = serde_json::to_string(&EventType::BlockCreated).unwrap();
        assert_eq!(json, "\"block.created\"");
        let parsed: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EventType::BlockCreated);
        assert_eq!("execution.step".parse::<EventType>().unwrap(), EventType::ExecutionStep);
    }

    #[test]
    fn actor_is_tagged_by_type_field() {
        let actor = Actor::agent(Uuid::now_v7(), "researcher");
        let json = serde_json::to_value(&actor).unwrap();
        assert_eq!(json["type"], "agent");
        assert_eq!(json["name"], "researcher");

        let system = Actor::system("retention job");
        let json = serde_json::to_value(&system).unwrap();
        assert_eq!(json["type"], "system");
        assert_eq!(json["reason"], "retention job");
    }

    #[test]
    fn actor_deserializes_exactly_one_variant() {
        let parsed: Actor =
            serde_json::from_str(r#"{"type":"user","user_id":"0192d3a0-0000-7000-8000-000000000001"}"#)
                .unwrap();
        assert!(matches!(parsed, Actor::User { .. }));
    }
}
