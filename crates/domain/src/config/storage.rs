use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the gateway's durable state lives on disk: the JSON session
/// store (`<state_dir>/sessions/<scenario>.json`) and provisioned fleet
/// records (`<state_dir>/fleets/<scenario>.fleet.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "d_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
        }
    }
}

fn d_state_dir() -> PathBuf {
    PathBuf::from("./data")
}
