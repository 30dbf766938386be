mod discovery;
mod orchestrator;
mod scenarios;
mod server;
mod sessions;
mod storage;
mod throttle;

pub use discovery::*;
pub use orchestrator::*;
pub use scenarios::*;
pub use server::*;
pub use sessions::*;
pub use storage::*;
pub use throttle::*;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from a TOML file and overridable by
/// `INV_<SECTION>_<FIELD>` environment variables at the gateway boundary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scenarios: Vec<ScenarioEntry>,
}

impl Config {
    pub fn load_from_str(toml_text: &str) -> crate::Result<Self> {
        toml::from_str(toml_text).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Apply `INV_<SECTION>_<FIELD>` environment overrides on top of a
    /// file-loaded configuration. Unknown or unparseable variables are
    /// ignored; only the fields listed in the config file format (§6) are
    /// recognized.
    pub fn apply_env_overrides(&mut self) {
        fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = env_parse("INV_SERVER_PORT") {
            self.server.port = v;
        }
        if let Ok(v) = std::env::var("INV_SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env_parse("INV_SESSIONS_MAX_ACTIVE") {
            self.sessions.max_active = v;
        }
        if let Some(v) = env_parse("INV_SESSIONS_MAX_RECENT") {
            self.sessions.max_recent = v;
        }
        if let Some(v) = env_parse("INV_SESSIONS_IDLE_TIMEOUT_SECS") {
            self.sessions.idle_timeout_secs = v;
        }
        if let Some(v) = env_parse("INV_ORCHESTRATOR_STALL_WATCHDOG_SECS") {
            self.orchestrator.stall_watchdog_secs = v;
        }
        if let Some(v) = env_parse("INV_ORCHESTRATOR_MAX_RUN_ATTEMPTS") {
            self.orchestrator.max_run_attempts = v;
        }
        if let Some(v) = env_parse("INV_DISCOVERY_TTL_SECS") {
            self.discovery.ttl_secs = v;
        }
        if let Some(v) = env_parse("INV_DISCOVERY_TOKEN_STALENESS_SECS") {
            self.discovery.token_staleness_secs = v;
        }
        if let Ok(v) = std::env::var("INV_DISCOVERY_API_BASE_URL") {
            self.discovery.api_base_url = v;
        }
        if let Some(v) = env_parse("INV_THROTTLE_CAPACITY") {
            self.throttle.capacity = v;
        }
        if let Some(v) = env_parse("INV_THROTTLE_WINDOW_SECS") {
            self.throttle.window_secs = v;
        }
        if let Some(v) = env_parse("INV_THROTTLE_ERROR_THRESHOLD") {
            self.throttle.error_threshold = v;
        }
        if let Some(v) = env_parse("INV_THROTTLE_COOLDOWN_SECS") {
            self.throttle.cooldown_secs = v;
        }
        if let Ok(v) = std::env::var("INV_STORAGE_STATE_DIR") {
            self.storage.state_dir = v.into();
        }
    }

    /// Sanity-check config values that deserialize successfully but make
    /// no operational sense. Warnings are logged; errors block startup.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.sessions.max_active == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "sessions.max_active must be at least 1".into(),
            });
        }
        if self.sessions.max_recent == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "sessions.max_recent is 0 — finalized sessions will not be cached"
                    .into(),
            });
        }
        if self.orchestrator.max_run_attempts == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "orchestrator.max_run_attempts must be at least 1".into(),
            });
        }
        if self.throttle.capacity == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "throttle.capacity must be at least 1 — a 0-capacity semaphore never admits a query"
                    .into(),
            });
        }
        if self.scenarios.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "no scenarios configured — session creation will always fail with ScenarioUnknown"
                    .into(),
            });
        }

        issues
    }

    pub fn has_fatal_issues(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_warns_about_no_scenarios() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.message.contains("no scenarios configured")));
        assert!(!Config::has_fatal_issues(&issues));
    }

    #[test]
    fn zero_capacity_is_fatal() {
        let mut cfg = Config::default();
        cfg.throttle.capacity = 0;
        let issues = cfg.validate();
        assert!(Config::has_fatal_issues(&issues));
    }

    #[test]
    fn load_from_str_applies_defaults() {
        let cfg = Config::load_from_str("").unwrap();
        assert_eq!(cfg.sessions.max_active, 20);
        assert_eq!(cfg.throttle.capacity, 4);
    }
}
