use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Ceiling on concurrently active sessions. `Create` fails with
    /// `CapacityExceeded` once this is reached.
    #[serde(default = "d_max_active")]
    pub max_active: usize,
    /// Size of the bounded recent-cache of finalized sessions.
    #[serde(default = "d_max_recent")]
    pub max_recent: usize,
    /// Idle window after a session reaches `Completed` before eviction.
    #[serde(default = "d_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_active: d_max_active(),
            max_recent: d_max_recent(),
            idle_timeout_secs: d_idle_timeout_secs(),
        }
    }
}

fn d_max_active() -> usize {
    20
}
fn d_max_recent() -> usize {
    100
}
fn d_idle_timeout_secs() -> u64 {
    600
}
