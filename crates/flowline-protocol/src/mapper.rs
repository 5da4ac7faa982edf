// Internal step-event to wire-event mapping
//
// The mapping is total: every StepEvent kind either produces a wire event
// or is deliberately dropped. Dropped kinds are counted per kind so the
// behavior stays observable without turning it into an error.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

use flowline_core::StepEvent;

use crate::events::{StreamEvent, StreamEventKind};

/// Maps internal step events to the external wire vocabulary.
#[derive(Default)]
pub struct EventMapper {
    dropped: Mutex<HashMap<&'static str, u64>>,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one step event into its wire representation.
    ///
    /// `index` and `timestamp` come from the stored event, not from the
    /// mapper. Returns None for kinds with no external equivalent.
    pub fn to_wire(
        &self,
        step: &StepEvent,
        index: i64,
        timestamp: DateTime<Utc>,
    ) -> Option<StreamEvent> {
        let execution_id = step.execution_id();
        let node_id = step.node_id().map(str::to_string);

        let (kind, data) = match step {
            StepEvent::ExecutionStarted { .. } => (StreamEventKind::ExecutionStart, json!({})),
            StepEvent::NodeStarted { .. } => (StreamEventKind::NodeStart, json!({})),
            StepEvent::NodeOutputDelta { delta, .. } => {
                (StreamEventKind::NodeOutput, json!({ "delta": delta }))
            }
            StepEvent::ToolCallStarted {
                tool_call_id,
                tool_name,
                ..
            } => (
                StreamEventKind::ToolCall,
                json!({ "toolCallId": tool_call_id, "toolName": tool_name }),
            ),
            StepEvent::ToolCallCompleted {
                tool_call_id,
                success,
                output,
                ..
            } => (
                StreamEventKind::ToolResult,
                json!({ "toolCallId": tool_call_id, "success": success, "output": output }),
            ),
            StepEvent::NodeCompleted { output, .. } => {
                (StreamEventKind::NodeComplete, json!({ "output": output }))
            }
            StepEvent::NodeFailed { error, .. } => {
                (StreamEventKind::NodeError, json!({ "error": error }))
            }
            StepEvent::ExecutionCompleted { output, .. } => {
                (StreamEventKind::ExecutionComplete, json!({ "output": output }))
            }
            StepEvent::ExecutionFailed { error, .. } => {
                (StreamEventKind::ExecutionError, json!({ "error": error }))
            }
            // Side-channel payloads are forwarded as an opaque envelope
            // rather than dropped, for clients that choose to interpret
            // them.
            StepEvent::SubExecution {
                child_execution_id,
                event,
                ..
            } => (
                StreamEventKind::Data,
                json!({ "childExecutionId": child_execution_id, "event": event }),
            ),
            // Internal-only kinds: no external equivalent.
            StepEvent::TokenUsage { .. } | StepEvent::TraceSpan { .. } => {
                self.record_drop(step.kind());
                return None;
            }
        };

        Some(StreamEvent {
            index,
            kind,
            execution_id,
            node_id,
            data,
            timestamp,
        })
    }

    fn record_drop(&self, kind: &'static str) {
        let mut dropped = self.dropped.lock();
        let count = dropped.entry(kind).or_insert(0);
        if *count == 0 {
            tracing::debug!(kind, "dropping step event kind with no wire equivalent");
        }
        *count += 1;
    }

    /// Per-kind counts of events dropped because they have no external
    /// mapping. For debugging and metrics.
    pub fn dropped_counts(&self) -> HashMap<&'static str, u64> {
        self.dropped.lock().clone()
    }
}
