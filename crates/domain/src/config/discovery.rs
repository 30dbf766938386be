use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "d_ttl_secs")]
    pub ttl_secs: u64,
    /// Credential re-acquisition threshold when the issuer exposes no
    /// expiry. When it does, the backend uses `min(this, expiry - 5min)`.
    #[serde(default = "d_token_staleness_secs")]
    pub token_staleness_secs: u64,
    /// Base URL of the workspace control-plane API used to discover graph
    /// model and eventhouse coordinates by naming convention.
    #[serde(default = "d_api_base_url")]
    pub api_base_url: String,
    /// Display-name substring used to pick a `GraphModel` item when a
    /// workspace has more than one.
    #[serde(default = "d_graph_model_name_prefix")]
    pub graph_model_name_prefix: String,
    /// Display-name substring used to pick a `KQLDatabase` item when a
    /// workspace has more than one.
    #[serde(default = "d_eventhouse_name_prefix")]
    pub eventhouse_name_prefix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: d_ttl_secs(),
            token_staleness_secs: d_token_staleness_secs(),
            api_base_url: d_api_base_url(),
            graph_model_name_prefix: d_graph_model_name_prefix(),
            eventhouse_name_prefix: d_eventhouse_name_prefix(),
        }
    }
}

fn d_ttl_secs() -> u64 {
    600
}
fn d_token_staleness_secs() -> u64 {
    3000
}
fn d_api_base_url() -> String {
    "https://api.fabric.microsoft.com/v1".into()
}
fn d_graph_model_name_prefix() -> String {
    "incident".into()
}
fn d_eventhouse_name_prefix() -> String {
    "incident".into()
}
