//! `inv-gateway provision` — runs [`inv_provisioner::AgentProvisioner`]
//! against a scenario's manifest and writes the resulting fleet record to
//! `<state_dir>/fleets/<scenario>.fleet.json`, the same path
//! [`crate::bootstrap::build_app_state`] and `inv-gateway doctor` read
//! from.
//!
//! No live agent-hosting project is configured for this deployment, so
//! provisioning runs against [`inv_provisioner::MockAgentClient`] — the
//! provisioning-time analog of `inv_orchestrator::MockAgentRuntime`.

use std::collections::HashMap;

use inv_domain::config::Config;
use inv_domain::model::ScenarioManifest;
use inv_provisioner::{AgentProvisioner, MockAgentClient, ProgressEvent};

pub async fn run(config: &Config, scenario_name: &str, search_connection_id: &str) -> anyhow::Result<()> {
    let entry = config
        .scenarios
        .iter()
        .find(|s| s.name == scenario_name)
        .ok_or_else(|| anyhow::anyhow!("no such scenario in config: {scenario_name}"))?;

    let mut manifest = ScenarioManifest::load_from_file(&entry.manifest_path)
        .map_err(|e| anyhow::anyhow!("loading manifest for scenario {scenario_name}: {e}"))?;
    crate::bootstrap::apply_manifest_overrides(&mut manifest, &entry.overrides);

    let client = Box::new(MockAgentClient::new());
    let provisioner = AgentProvisioner::new(client).with_progress(Box::new(|event: ProgressEvent| {
        let remote_id = event.remote_id.as_deref().unwrap_or("-");
        println!("[{:?}] {} ({remote_id})", event.phase, event.name);
    }));

    let host = if config.server.host == "0.0.0.0" {
        "localhost"
    } else {
        config.server.host.as_str()
    };
    let api_base_url = format!("http://{host}:{}/scenarios/{scenario_name}", config.server.port);

    let graph_name = manifest
        .data_sources
        .graph
        .config
        .graph_name
        .clone()
        .unwrap_or_else(|| "incident-graph".into());

    let fleet = provisioner
        .provision_from_config(
            &manifest,
            &api_base_url,
            search_connection_id,
            &graph_name,
            &HashMap::new(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("provisioning scenario {scenario_name}: {e}"))?;

    let fleet_dir = config.storage.state_dir.join("fleets");
    std::fs::create_dir_all(&fleet_dir)
        .map_err(|e| anyhow::anyhow!("creating {}: {e}", fleet_dir.display()))?;
    let fleet_path = fleet_dir.join(format!("{scenario_name}.fleet.json"));
    let serialized = serde_json::to_string_pretty(&fleet)?;
    std::fs::write(&fleet_path, serialized)
        .map_err(|e| anyhow::anyhow!("writing {}: {e}", fleet_path.display()))?;

    println!(
        "\nprovisioned {} sub-agent(s) + orchestrator for \"{scenario_name}\" -> {}",
        fleet.sub_agents.len(),
        fleet_path.display(),
    );

    Ok(())
}
