use serde::Serialize;

/// Structured trace events emitted across the investigation runtime.
/// Each is logged as a single JSON line via `tracing`; none of these are
/// persisted state — they exist for observability only.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        scenario: String,
    },
    SessionFinalized {
        session_id: String,
        status: String,
        steps: usize,
    },
    SessionEvicted {
        session_id: String,
        reason: String,
    },
    BackendCall {
        backend: String,
        role: String,
        duration_ms: u64,
        outcome: String,
    },
    RetryAttempt {
        backend: String,
        class: String,
        attempt: u32,
        wait_ms: u64,
    },
    CircuitStateChanged {
        backend: String,
        from: String,
        to: String,
    },
    DiscoveryRefreshed {
        source: String,
        stale: bool,
    },
    AgentProvisioned {
        phase: String,
        name: String,
        remote_id: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "inv_event");
    }
}
