use serde::Serialize;

/// One message on the outbound SSE stream. Field names here are
/// bit-exact with the public event catalog — the gateway serializes the
/// payload with `#[serde(flatten)]` alongside the event name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SSEEvent {
    #[serde(rename = "run_start")]
    RunStart {
        run_id: String,
        alert: String,
        timestamp: chrono::DateTime<chrono::Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
    #[serde(rename = "thread_created")]
    ThreadCreated {
        thread_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
    #[serde(rename = "step_thinking")]
    StepThinking {
        agent: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
    #[serde(rename = "step_start")]
    StepStart {
        step: u64,
        agent: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
    #[serde(rename = "step_complete")]
    StepComplete {
        step: u64,
        agent: String,
        duration: String,
        query: String,
        response: String,
        #[serde(default)]
        error: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
    #[serde(rename = "message")]
    Message {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
    #[serde(rename = "run_complete")]
    RunComplete {
        steps: u64,
        tokens: u64,
        time: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u32>,
    },
}

impl SSEEvent {
    /// The SSE frame's `event:` field name.
    pub fn event_name(&self) -> &'static str {
        match self {
            SSEEvent::RunStart { .. } => "run_start",
            SSEEvent::ThreadCreated { .. } => "thread_created",
            SSEEvent::StepThinking { .. } => "step_thinking",
            SSEEvent::StepStart { .. } => "step_start",
            SSEEvent::StepComplete { .. } => "step_complete",
            SSEEvent::Message { .. } => "message",
            SSEEvent::RunComplete { .. } => "run_complete",
            SSEEvent::Error { .. } => "error",
        }
    }

    /// True for the two event kinds that terminate a `Run` sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SSEEvent::RunComplete { .. } | SSEEvent::Error { .. })
    }

    /// The JSON payload, without the `type` discriminant (the discriminant
    /// is carried separately as the SSE frame's `event:` field).
    pub fn payload_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("type");
        }
        value
    }
}

/// Truncate a string to `max` chars, appending an ellipsis if it overflows.
/// Shared by OrchestratorRuntime (query/response truncation) and any
/// backend that surfaces raw error bodies.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('\u{2026}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_matches_catalog() {
        let ev = SSEEvent::RunComplete {
            steps: 2,
            tokens: 100,
            time: "4.1s".into(),
            turn: None,
        };
        assert_eq!(ev.event_name(), "run_complete");
        assert!(ev.is_terminal());
    }

    #[test]
    fn step_complete_is_not_terminal() {
        let ev = SSEEvent::StepComplete {
            step: 1,
            agent: "GraphExplorerAgent".into(),
            duration: "1.0s".into(),
            query: "MATCH (n) RETURN n".into(),
            response: "{}".into(),
            error: false,
            turn: None,
        };
        assert!(!ev.is_terminal());
    }

    #[test]
    fn payload_json_omits_type_tag() {
        let ev = SSEEvent::Error {
            message: "boom".into(),
            turn: None,
        };
        let payload = ev.payload_json();
        assert!(payload.get("type").is_none());
        assert_eq!(payload["message"], "boom");
    }

    #[test]
    fn truncate_respects_bound_and_adds_ellipsis() {
        let long = "a".repeat(600);
        let truncated = truncate_with_ellipsis(&long, 500);
        assert_eq!(truncated.chars().count(), 501);
        assert!(truncated.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_leaves_short_strings_untouched() {
        assert_eq!(truncate_with_ellipsis("short", 500), "short");
    }
}
