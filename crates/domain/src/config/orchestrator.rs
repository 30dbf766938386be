use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// No event arriving within this window synthesizes a "stuck" error.
    #[serde(default = "d_stall_watchdog_secs")]
    pub stall_watchdog_secs: u64,
    /// Whole-run attempts before giving up and surfacing `error`.
    #[serde(default = "d_max_run_attempts")]
    pub max_run_attempts: u32,
    /// Truncation bound for a step's query field.
    #[serde(default = "d_query_truncate")]
    pub query_truncate_chars: usize,
    /// Truncation bound for a step's response field.
    #[serde(default = "d_response_truncate")]
    pub response_truncate_chars: usize,
    /// Bounded channel capacity between the worker task and the SSE
    /// consumer.
    #[serde(default = "d_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stall_watchdog_secs: d_stall_watchdog_secs(),
            max_run_attempts: d_max_run_attempts(),
            query_truncate_chars: d_query_truncate(),
            response_truncate_chars: d_response_truncate(),
            event_channel_capacity: d_event_channel_capacity(),
        }
    }
}

fn d_stall_watchdog_secs() -> u64 {
    120
}
fn d_max_run_attempts() -> u32 {
    2
}
fn d_query_truncate() -> usize {
    500
}
fn d_response_truncate() -> usize {
    2000
}
fn d_event_channel_capacity() -> usize {
    32
}
