use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One `[[scenarios]]` table: points at a manifest file and carries any
/// env-style overrides for that scenario's backend bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub manifest_path: PathBuf,
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}
