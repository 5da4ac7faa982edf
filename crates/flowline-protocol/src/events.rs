// External stream event vocabulary
//
// These are the payloads carried in `data:` frames on the execution
// stream endpoint. Field names are camelCase on the wire; `index` is the
// client's resume cursor (`fromIndex` on reconnect).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Payload of the terminal sentinel frame marking end-of-stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Kinds of events visible to stream clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum StreamEventKind {
    ExecutionStart,
    NodeStart,
    NodeOutput,
    ToolCall,
    ToolResult,
    NodeComplete,
    NodeError,
    ExecutionComplete,
    ExecutionError,
    /// Opaque envelope for side-channel payloads (nested sub-execution
    /// streams) that have no first-class representation
    Data,
    /// Instruction to re-establish the connection using the last
    /// received index; emitted when the connection lifetime cap is hit
    Reconnect,
}

impl StreamEventKind {
    /// Terminal kinds end the logical stream; clients stop iterating.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEventKind::ExecutionComplete | StreamEventKind::ExecutionError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEventKind::ExecutionStart => "execution_start",
            StreamEventKind::NodeStart => "node_start",
            StreamEventKind::NodeOutput => "node_output",
            StreamEventKind::ToolCall => "tool_call",
            StreamEventKind::ToolResult => "tool_result",
            StreamEventKind::NodeComplete => "node_complete",
            StreamEventKind::NodeError => "node_error",
            StreamEventKind::ExecutionComplete => "execution_complete",
            StreamEventKind::ExecutionError => "execution_error",
            StreamEventKind::Data => "data",
            StreamEventKind::Reconnect => "reconnect",
        }
    }
}

impl std::fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event on the execution stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StreamEvent {
    /// Position of the event in the execution's event sequence; the
    /// client's `fromIndex` on reconnect is the first index it has not
    /// yet received
    pub index: i64,
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    pub execution_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    /// Render as a wire frame: `data: <json>` terminated by a blank line.
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {}\n\n", json)
    }
}

/// Heartbeat comment frame; content is irrelevant, purpose is keep-alive.
pub fn heartbeat_frame() -> String {
    ": keep-alive\n\n".to_string()
}

/// Terminal sentinel frame.
pub fn done_frame() -> String {
    format!("data: {}\n\n", DONE_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_event_uses_camel_case_wire_names() {
        let event = StreamEvent {
            index: 4,
            kind: StreamEventKind::NodeOutput,
            execution_id: Uuid::now_v7(),
            node_id: Some("node-1".to_string()),
            data: json!({"delta": "hi"}),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "node_output");
        assert_eq!(value["index"], 4);
        assert_eq!(value["nodeId"], "node-1");
        assert!(value["executionId"].is_string());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn terminal_kinds() {
        assert!(StreamEventKind::ExecutionComplete.is_terminal());
        assert!(StreamEventKind::ExecutionError.is_terminal());
        assert!(!StreamEventKind::NodeComplete.is_terminal());
        assert!(!StreamEventKind::Reconnect.is_terminal());
    }

    #[test]
    fn frames_are_blank_line_terminated() {
        let event = StreamEvent {
            index: 0,
            kind: StreamEventKind::ExecutionStart,
            execution_id: Uuid::now_v7(),
            node_id: None,
            data: json!({}),
            timestamp: Utc::now(),
        };
        assert!(event.to_frame().starts_with("data: {"));
        assert!(event.to_frame().ends_with("\n\n"));
        assert_eq!(done_frame(), "data: [DONE]\n\n");
        assert!(heartbeat_frame().starts_with(':'));
    }
}
