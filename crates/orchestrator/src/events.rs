//! The remote agent SDK's callback surface, modeled as a closed set of
//! events rather than actual blocking callbacks — the worker task drives
//! a [`crate::remote::RemoteAgentRuntime`] and receives these over a
//! channel, as if each callback had pushed one.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallKind {
    ConnectedAgent,
    Search,
    OpenApi,
}

/// One observed tool call, already resolved to a display agent name where
/// applicable (connected-agent calls carry the remote id on the wire; the
/// runtime maps it back to a name using the fleet record).
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub kind: ToolCallKind,
    pub agent: String,
    pub query: String,
    pub response: String,
    pub duration_ms: u64,
    pub error: bool,
}

#[derive(Debug, Clone)]
pub enum RawCallback {
    /// Carries the thread id, freshly created on turn 0 or the existing
    /// one reused on a follow-up turn.
    ThreadRunInProgress { thread_id: String },
    RunStepInProgress,
    RunStepCompleted { tool_calls: Vec<ToolCallResult> },
    RunStepFailed { tool_calls: Vec<ToolCallResult> },
    MessageDelta { text: String },
    ThreadRunCompleted { total_tokens: u64 },
    ThreadRunFailed { message: String },
}
