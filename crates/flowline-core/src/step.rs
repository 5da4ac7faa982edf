// Step events emitted by the execution engine
//
// StepEvent is the internal vocabulary for execution progress. Producers
// wrap one StepEvent per execution step into an `execution.step` domain
// event; the protocol layer maps it to the external wire vocabulary
// (some kinds intentionally have no external equivalent).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Events emitted during execution of a flow or block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StepEvent {
    /// Execution started
    ExecutionStarted { execution_id: Uuid },

    /// A node (block within a flow) started
    NodeStarted { execution_id: Uuid, node_id: String },

    /// Streaming output fragment from a node
    NodeOutputDelta {
        execution_id: Uuid,
        node_id: String,
        delta: String,
    },

    /// A node requested a tool invocation
    ToolCallStarted {
        execution_id: Uuid,
        node_id: String,
        tool_call_id: String,
        tool_name: String,
    },

    /// A tool invocation finished
    ToolCallCompleted {
        execution_id: Uuid,
        node_id: String,
        tool_call_id: String,
        success: bool,
        output: Value,
    },

    /// A node finished successfully
    NodeCompleted {
        execution_id: Uuid,
        node_id: String,
        output: Value,
    },

    /// A node failed
    NodeFailed {
        execution_id: Uuid,
        node_id: String,
        error: String,
    },

    /// Execution finished successfully
    ExecutionCompleted { execution_id: Uuid, output: Value },

    /// Execution failed with an error
    ExecutionFailed { execution_id: Uuid, error: String },

    /// Side channel: an event from a nested sub-execution spawned by a node.
    /// Forwarded to clients as an opaque data envelope.
    SubExecution {
        execution_id: Uuid,
        node_id: String,
        child_execution_id: Uuid,
        event: Value,
    },

    /// Token accounting, internal only
    TokenUsage {
        execution_id: Uuid,
        node_id: Option<String>,
        input_tokens: u32,
        output_tokens: u32,
    },

    /// Tracing span record, internal only
    TraceSpan {
        execution_id: Uuid,
        name: String,
        duration_ms: u64,
    },
}

impl StepEvent {
    pub fn execution_started(execution_id: Uuid) -> Self {
        StepEvent::ExecutionStarted { execution_id }
    }

    pub fn node_started(execution_id: Uuid, node_id: impl Into<String>) -> Self {
        StepEvent::NodeStarted {
            execution_id,
            node_id: node_id.into(),
        }
    }

    pub fn node_output_delta(
        execution_id: Uuid,
        node_id: impl Into<String>,
        delta: impl Into<String>,
    ) -> Self {
        StepEvent::NodeOutputDelta {
            execution_id,
            node_id: node_id.into(),
            delta: delta.into(),
        }
    }

    pub fn tool_call_started(
        execution_id: Uuid,
        node_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        StepEvent::ToolCallStarted {
            execution_id,
            node_id: node_id.into(),
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        }
    }

    pub fn tool_call_completed(
        execution_id: Uuid,
        node_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        success: bool,
        output: Value,
    ) -> Self {
        StepEvent::ToolCallCompleted {
            execution_id,
            node_id: node_id.into(),
            tool_call_id: tool_call_id.into(),
            success,
            output,
        }
    }

    pub fn node_completed(execution_id: Uuid, node_id: impl Into<String>, output: Value) -> Self {
        StepEvent::NodeCompleted {
            execution_id,
            node_id: node_id.into(),
            output,
        }
    }

    pub fn node_failed(
        execution_id: Uuid,
        node_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        StepEvent::NodeFailed {
            execution_id,
            node_id: node_id.into(),
            error: error.into(),
        }
    }

    pub fn execution_completed(execution_id: Uuid, output: Value) -> Self {
        StepEvent::ExecutionCompleted {
            execution_id,
            output,
        }
    }

    pub fn execution_failed(execution_id: Uuid, error: impl Into<String>) -> Self {
        StepEvent::ExecutionFailed {
            execution_id,
            error: error.into(),
        }
    }

    /// Get the execution ID for this event
    pub fn execution_id(&self) -> Uuid {
        match self {
            StepEvent::ExecutionStarted { execution_id }
            | StepEvent::NodeStarted { execution_id, .. }
            | StepEvent::NodeOutputDelta { execution_id, .. }
            | StepEvent::ToolCallStarted { execution_id, .. }
            | StepEvent::ToolCallCompleted { execution_id, .. }
            | StepEvent::NodeCompleted { execution_id, .. }
            | StepEvent::NodeFailed { execution_id, .. }
            | StepEvent::ExecutionCompleted { execution_id, .. }
            | StepEvent::ExecutionFailed { execution_id, .. }
            | StepEvent::SubExecution { execution_id, .. }
            | StepEvent::TokenUsage { execution_id, .. }
            | StepEvent::TraceSpan { execution_id, .. } => *execution_id,
        }
    }

    /// The node this event belongs to, if it is node-scoped
    pub fn node_id(&self) -> Option<&str> {
        match self {
            StepEvent::NodeStarted { node_id, .. }
            | StepEvent::NodeOutputDelta { node_id, .. }
            | StepEvent::ToolCallStarted { node_id, .. }
            | StepEvent::ToolCallCompleted { node_id, .. }
            | StepEvent::NodeCompleted { node_id, .. }
            | StepEvent::NodeFailed { node_id, .. }
            | StepEvent::SubExecution { node_id, .. } => Some(node_id),
            StepEvent::TokenUsage { node_id, .. } => node_id.as_deref(),
            StepEvent::ExecutionStarted { .. }
            | StepEvent::ExecutionCompleted { .. }
            | StepEvent::ExecutionFailed { .. }
            | StepEvent::TraceSpan { .. } => None,
        }
    }

    /// Stable kind name, used for logging and drop accounting
    pub fn kind(&self) -> &'static str {
        match self {
            StepEvent::ExecutionStarted { .. } => "execution_started",
            StepEvent::NodeStarted { .. } => "node_started",
            StepEvent::NodeOutputDelta { .. } => "node_output_delta",
            StepEvent::ToolCallStarted { .. } => "tool_call_started",
            StepEvent::ToolCallCompleted { .. } => "tool_call_completed",
            StepEvent::NodeCompleted { .. } => "node_completed",
            StepEvent::NodeFailed { .. } => "node_failed",
            StepEvent::ExecutionCompleted { .. } => "execution_completed",
            StepEvent::ExecutionFailed { .. } => "execution_failed",
            StepEvent::SubExecution { .. } => "sub_execution",
            StepEvent::TokenUsage { .. } => "token_usage",
            StepEvent::TraceSpan { .. } => "trace_span",
        }
    }
}
