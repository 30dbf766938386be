use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One remote agent as recorded after provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub model: String,
    pub is_orchestrator: bool,
    pub tools: Vec<String>,
    pub connected_agents: Vec<String>,
}

/// The outcome of `ProvisionFromConfig`: the orchestrator plus every
/// specialist it can delegate to, keyed by display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetRecord {
    pub orchestrator: AgentRecord,
    pub sub_agents: HashMap<String, AgentRecord>,
}

impl FleetRecord {
    /// Resolve a display name to its remote agent id. Used at runtime by
    /// the orchestrator to turn a tool-call's agent name into an id for
    /// logging and step attribution.
    pub fn remote_id_for(&self, name: &str) -> Option<&str> {
        if self.orchestrator.name == name {
            return Some(&self.orchestrator.id);
        }
        self.sub_agents.get(name).map(|a| a.id.as_str())
    }
}

/// Emitted once per created/deleted remote agent during provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProvisionPhase,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPhase {
    Cleanup,
    Specialist,
    Orchestrator,
}
