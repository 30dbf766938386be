use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "d_capacity")]
    pub capacity: usize,
    #[serde(default = "d_window_secs")]
    pub window_secs: u64,
    #[serde(default = "d_error_threshold")]
    pub error_threshold: u32,
    #[serde(default = "d_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Per-backend-role overrides (keyed by the backend role, e.g. "graph"
    /// or "telemetry"), merged over the defaults above.
    #[serde(default)]
    pub overrides: HashMap<String, ThrottleOverride>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            capacity: d_capacity(),
            window_secs: d_window_secs(),
            error_threshold: d_error_threshold(),
            cooldown_secs: d_cooldown_secs(),
            overrides: HashMap::new(),
        }
    }
}

impl ThrottleConfig {
    /// Resolve the effective settings for a named backend role.
    pub fn resolve(&self, role: &str) -> ResolvedThrottle {
        let ovr = self.overrides.get(role);
        ResolvedThrottle {
            capacity: ovr.and_then(|o| o.capacity).unwrap_or(self.capacity),
            window_secs: ovr.and_then(|o| o.window_secs).unwrap_or(self.window_secs),
            error_threshold: ovr
                .and_then(|o| o.error_threshold)
                .unwrap_or(self.error_threshold),
            cooldown_secs: ovr
                .and_then(|o| o.cooldown_secs)
                .unwrap_or(self.cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThrottleOverride {
    pub capacity: Option<usize>,
    pub window_secs: Option<u64>,
    pub error_threshold: Option<u32>,
    pub cooldown_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedThrottle {
    pub capacity: usize,
    pub window_secs: u64,
    pub error_threshold: u32,
    pub cooldown_secs: u64,
}

fn d_capacity() -> usize {
    4
}
fn d_window_secs() -> u64 {
    60
}
fn d_error_threshold() -> u32 {
    5
}
fn d_cooldown_secs() -> u64 {
    30
}
