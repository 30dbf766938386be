//! Composition root: turns a loaded [`Config`] into a running [`AppState`].
//!
//! Scenario fleets are not provisioned here — [`inv_provisioner::AgentProvisioner`]
//! is invoked out-of-band (a separate provisioning step against the remote
//! agent-hosting service) and its output, a [`FleetRecord`], is read back
//! from `<state_dir>/fleets/<scenario>.fleet.json`. A scenario with no
//! fleet file on disk simply never enters the registry's fleet map, and
//! `SessionRegistry::create` rejects it with `ScenarioUnknown`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use inv_backends::backends::fabric_workspace::FabricWorkspaceItemsClient;
use inv_backends::discovery::EnvOverrides;
use inv_backends::{BackendFactory, CredentialFn, DiscoveryCache};
use inv_domain::config::Config;
use inv_domain::model::ScenarioManifest;
use inv_domain::Error;
use inv_orchestrator::{MockAgentRuntime, OrchestratorRuntime};
use inv_provisioner::FleetRecord;
use inv_sessions::{JsonFileSessionStore, SessionRegistry};

use crate::state::AppState;

pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let mut manifests = HashMap::new();
    let mut fleets = HashMap::new();

    for entry in &config.scenarios {
        let mut manifest = ScenarioManifest::load_from_file(&entry.manifest_path)
            .map_err(|e| anyhow::anyhow!("loading manifest for scenario {}: {e}", entry.name))?;
        apply_manifest_overrides(&mut manifest, &entry.overrides);

        let fleet_path = config
            .storage
            .state_dir
            .join("fleets")
            .join(format!("{}.fleet.json", entry.name));
        if fleet_path.exists() {
            let raw = std::fs::read_to_string(&fleet_path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", fleet_path.display()))?;
            let fleet: FleetRecord = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("parsing {}: {e}", fleet_path.display()))?;
            fleets.insert(entry.name.clone(), Arc::new(fleet));
        } else {
            tracing::warn!(
                scenario = %entry.name,
                path = %fleet_path.display(),
                "no fleet file found — this scenario will reject session creation until provisioned",
            );
        }

        manifests.insert(entry.name.clone(), manifest);
    }

    // No live agent-hosting project is configured for this deployment, so
    // every run is driven by the offline mock runtime. A production
    // deployment wires its own `RemoteAgentRuntime` against the agent
    // platform it provisions against (see DESIGN.md).
    let runtime = Arc::new(OrchestratorRuntime::new(
        config.orchestrator.clone(),
        Arc::new(MockAgentRuntime),
    ));

    let store = Arc::new(JsonFileSessionStore::new(&config.storage.state_dir)?);

    let registry = SessionRegistry::new(config.sessions.clone(), runtime, fleets, store);

    let backend_factory = Arc::new(BackendFactory::new(
        ambient_credential(),
        config.throttle.clone(),
    ));

    let discovery = Arc::new(DiscoveryCache::new(
        Box::new(FabricWorkspaceItemsClient::new(
            config.discovery.api_base_url.clone(),
            ambient_credential(),
        )),
        Duration::from_secs(config.discovery.ttl_secs),
        config.discovery.graph_model_name_prefix.clone(),
        config.discovery.eventhouse_name_prefix.clone(),
        env_overrides_from_process_env(),
    ));

    Ok(AppState {
        config,
        registry,
        manifests: Arc::new(manifests),
        backend_factory,
        discovery,
    })
}

/// Ambient credential source for every Fabric-backed connector: a single
/// bearer token read from the environment. A production deployment with a
/// live Fabric workspace would swap this for a managed-identity token
/// provider (see DESIGN.md); no such SDK is part of this stack.
fn ambient_credential() -> CredentialFn {
    Arc::new(|| {
        std::env::var("INV_FABRIC_BEARER_TOKEN")
            .map_err(|_| Error::Config("INV_FABRIC_BEARER_TOKEN is not set".into()))
    })
}

fn env_overrides_from_process_env() -> EnvOverrides {
    EnvOverrides {
        workspace_id: std::env::var("FABRIC_WORKSPACE_ID").ok(),
        graph_model_id: std::env::var("FABRIC_GRAPH_MODEL_ID").ok(),
        eventhouse_query_uri: std::env::var("EVENTHOUSE_QUERY_URI").ok(),
        kql_database_name: std::env::var("FABRIC_KQL_DB_NAME").ok(),
    }
}

/// Apply simple dotted-key overrides (e.g. `"graph.endpoint"`,
/// `"telemetry.database_name"`) onto a manifest's data source bindings.
/// Unknown keys are logged and ignored rather than rejected, since a
/// scenario's overrides commonly target only one of the two backends.
pub(crate) fn apply_manifest_overrides(manifest: &mut ScenarioManifest, overrides: &HashMap<String, String>) {
    for (key, value) in overrides {
        let Some((role, field)) = key.split_once('.') else {
            tracing::warn!(key, "scenario override key must be \"<role>.<field>\", skipping");
            continue;
        };

        let binding = match role {
            "graph" => &mut manifest.data_sources.graph,
            "telemetry" => &mut manifest.data_sources.telemetry,
            _ => {
                tracing::warn!(key, "scenario override targets unknown role, skipping");
                continue;
            }
        };

        match field {
            "connector" => binding.connector = value.clone(),
            "endpoint" => binding.config.endpoint = Some(value.clone()),
            "workspace_id" => binding.config.workspace_id = Some(value.clone()),
            "graph_name" => binding.config.graph_name = Some(value.clone()),
            "database_name" => binding.config.database_name = Some(value.clone()),
            "auth_scope" => binding.config.auth_scope = Some(value.clone()),
            other => tracing::warn!(field = other, "scenario override targets unknown field, skipping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inv_domain::model::{BackendBinding, BackendConfig, DataSourceMap};

    fn manifest() -> ScenarioManifest {
        ScenarioManifest {
            name: "telco".into(),
            display_name: "Telco".into(),
            agents: vec![],
            data_sources: DataSourceMap {
                graph: BackendBinding {
                    connector: "mock-graph".into(),
                    config: BackendConfig::default(),
                },
                telemetry: BackendBinding {
                    connector: "mock-telemetry".into(),
                    config: BackendConfig::default(),
                },
                search_indexes: HashMap::new(),
            },
            example_questions: vec![],
        }
    }

    #[test]
    fn override_replaces_named_field() {
        let mut m = manifest();
        let overrides = HashMap::from([("graph.endpoint".to_string(), "https://example/graph".to_string())]);
        apply_manifest_overrides(&mut m, &overrides);
        assert_eq!(m.data_sources.graph.config.endpoint.as_deref(), Some("https://example/graph"));
        assert!(m.data_sources.telemetry.config.endpoint.is_none());
    }

    #[test]
    fn unknown_role_is_ignored_not_fatal() {
        let mut m = manifest();
        let overrides = HashMap::from([("search.endpoint".to_string(), "x".to_string())]);
        apply_manifest_overrides(&mut m, &overrides);
        assert!(m.data_sources.graph.config.endpoint.is_none());
    }
}
