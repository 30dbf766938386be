use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One investigation of one alert, possibly multi-turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub scenario: String,
    pub alert_text: String,
    pub status: SessionStatus,
    /// Opaque handle to the remote agent thread. Set once, on the first
    /// turn, and never changed afterward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    pub run_meta: RunMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, scenario: String, alert_text: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            scenario,
            alert_text,
            status: SessionStatus::Pending,
            thread_id: None,
            steps: Vec::new(),
            diagnosis: None,
            run_meta: RunMeta::default(),
            error_detail: None,
            turn_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            scenario: self.scenario.clone(),
            alert_excerpt: truncate(&self.alert_text, 120),
            status: self.status,
            step_count: self.steps.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('\u{2026}');
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Lightweight listing projection of a Session, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub scenario: String,
    pub alert_excerpt: String,
    pub status: SessionStatus,
    pub step_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Accumulated run metadata across all turns of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMeta {
    pub total_tokens: u64,
    pub total_steps: u64,
}

/// One tool-call result observed during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub index: u64,
    pub turn: u32,
    pub agent: String,
    /// Formatted duration, e.g. `"2.3s"`.
    pub duration: String,
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub error: bool,
}

// ── Scenario manifest ──────────────────────────────────────────────────

/// Declarative description of a scenario, loaded from a YAML manifest file.
/// Immutable once loaded; a new version replaces the old atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioManifest {
    pub name: String,
    pub display_name: String,
    pub agents: Vec<AgentSpec>,
    pub data_sources: DataSourceMap,
    #[serde(default)]
    pub example_questions: Vec<String>,
}

impl ScenarioManifest {
    /// Load and parse a manifest from a YAML file on disk.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(crate::Error::Io)?;
        serde_yaml::from_str(&raw)
            .map_err(|e| crate::Error::Config(format!("{}: {e}", path.display())))
    }
}

/// One remote agent to provision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub role: String,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub is_orchestrator: bool,
    #[serde(default)]
    pub connected_agents: Vec<String>,
    /// Either a single `.md` file path or a directory of `.md` files,
    /// composed per the prompt-composition algorithm.
    #[serde(default)]
    pub instructions_ref: Option<String>,
}

/// Scenario → backend bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceMap {
    pub graph: BackendBinding,
    pub telemetry: BackendBinding,
    #[serde(default)]
    pub search_indexes: HashMap<String, String>,
}

/// One connector selection plus its backend-specific config block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendBinding {
    pub connector: String,
    #[serde(default)]
    pub config: BackendConfig,
}

/// Runtime coordinates of a concrete backend. Fields are optional because
/// DiscoveryCache may resolve some of them at runtime rather than have them
/// present in the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub graph_name: Option<String>,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub auth_scope: Option<String>,
}

/// Cached mapping from logical → physical ids, produced by DiscoveryCache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricDiscovery {
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eventhouse_query_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kql_database_name: Option<String>,
    pub source: DiscoverySource,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    Env,
    Discovery,
    DiscoveryFailed,
    Partial,
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_excerpt_truncates_long_text() {
        let long = "x".repeat(200);
        let session = Session::new("s1".into(), "telco".into(), long, Utc::now());
        let summary = session.summary();
        assert_eq!(summary.alert_excerpt.chars().count(), 121);
        assert!(summary.alert_excerpt.ends_with('\u{2026}'));
    }

    #[test]
    fn alert_excerpt_leaves_short_text_untouched() {
        let session = Session::new("s1".into(), "telco".into(), "short alert".into(), Utc::now());
        assert_eq!(session.summary().alert_excerpt, "short alert");
    }
}
