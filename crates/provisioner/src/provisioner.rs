//! Two-pass fleet provisioning: specialists first (so their remote ids
//! exist), then orchestrators wrapping those ids as delegating tools.

use std::collections::HashMap;
use std::path::Path;

use inv_domain::model::{AgentSpec, DataSourceMap, ScenarioManifest};
use inv_domain::{Error, Result};
use serde_json::json;

use crate::catalog::{graph_tool_description, guidance_for};
use crate::client::{CreateAgentRequest, RemoteAgentClient, ToolDefinition};
use crate::model::{AgentRecord, FleetRecord, ProgressEvent, ProvisionPhase};
use crate::openapi::render_spec;
use crate::prompts::{compose_instructions, connector_tag, PromptSubstitutions};

const GRAPH_TEMPLATE: &str = include_str!("../templates/graph.yaml");
const TELEMETRY_TEMPLATE: &str = include_str!("../templates/telemetry.yaml");

pub type ProgressCallback<'a> = dyn Fn(ProgressEvent) + Send + Sync + 'a;

pub struct AgentProvisioner<'a> {
    client: Box<dyn RemoteAgentClient>,
    on_progress: Option<Box<ProgressCallback<'a>>>,
}

impl<'a> AgentProvisioner<'a> {
    pub fn new(client: Box<dyn RemoteAgentClient>) -> Self {
        Self {
            client,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, callback: Box<ProgressCallback<'a>>) -> Self {
        self.on_progress = Some(callback);
        self
    }

    fn emit(&self, phase: ProvisionPhase, name: &str, remote_id: Option<&str>) {
        if let Some(cb) = &self.on_progress {
            cb(ProgressEvent {
                phase,
                name: name.to_string(),
                remote_id: remote_id.map(str::to_string),
            });
        }
    }

    /// Deletes any remote agent whose display name is in `names`. Tolerates
    /// pagination/listing failures on individual deletes by logging and
    /// continuing rather than aborting the whole sweep.
    pub async fn cleanup_by_name(&self, names: &[String]) -> Result<usize> {
        let existing = self.client.list_agents().await?;
        let mut deleted = 0;
        for agent in existing {
            if names.contains(&agent.name) {
                match self.client.delete_agent(&agent.id).await {
                    Ok(()) => {
                        deleted += 1;
                        self.emit(ProvisionPhase::Cleanup, &agent.name, Some(&agent.id));
                    }
                    Err(e) => {
                        tracing::warn!(agent = %agent.name, error = %e, "could not delete agent, continuing");
                    }
                }
            }
        }
        Ok(deleted)
    }

    pub async fn provision_from_config(
        &self,
        manifest: &ScenarioManifest,
        api_base_url: &str,
        search_connection_id: &str,
        graph_name: &str,
        prompts: &HashMap<String, String>,
    ) -> Result<FleetRecord> {
        let all_names: Vec<String> = manifest.agents.iter().map(|a| a.name.clone()).collect();
        self.cleanup_by_name(&all_names).await?;

        let mut remote_ids: HashMap<String, AgentRecord> = HashMap::new();

        for spec in manifest.agents.iter().filter(|a| !a.is_orchestrator) {
            let instructions = self.resolve_instructions(spec, prompts, graph_name, &manifest.data_sources)?;
            let tools = self.build_tool_set(spec, api_base_url, search_connection_id, &manifest.data_sources)?;

            let created = self
                .client
                .create_agent(CreateAgentRequest {
                    model: spec.model.clone(),
                    name: spec.name.clone(),
                    instructions,
                    tools,
                })
                .await?;

            self.emit(ProvisionPhase::Specialist, &spec.name, Some(&created.id));
            remote_ids.insert(
                spec.name.clone(),
                AgentRecord {
                    id: created.id,
                    name: created.name,
                    model: spec.model.clone(),
                    is_orchestrator: false,
                    tools: spec.tools.clone(),
                    connected_agents: Vec::new(),
                },
            );
        }

        let orchestrator_spec = manifest
            .agents
            .iter()
            .find(|a| a.is_orchestrator)
            .ok_or_else(|| Error::Config("manifest has no orchestrator agent".into()))?;

        let mut connected_tools = Vec::new();
        for connected_name in &orchestrator_spec.connected_agents {
            let record = remote_ids.get(connected_name).ok_or_else(|| {
                Error::Config(format!(
                    "orchestrator references unknown connected agent {connected_name}"
                ))
            })?;
            connected_tools.push(ToolDefinition(json!({
                "type": "connected_agent",
                "connected_agent": {
                    "id": record.id,
                    "name": record.name,
                    "description": format!("Delegate to {}", record.name),
                },
            })));
        }
        for tool_name in &orchestrator_spec.tools {
            if tool_name == "dispatch_field_engineer" {
                connected_tools.push(dispatch_field_engineer_tool());
            }
        }

        let orchestrator_instructions =
            self.resolve_instructions(orchestrator_spec, prompts, graph_name, &manifest.data_sources)?;
        let created_orchestrator = self
            .client
            .create_agent(CreateAgentRequest {
                model: orchestrator_spec.model.clone(),
                name: orchestrator_spec.name.clone(),
                instructions: orchestrator_instructions,
                tools: connected_tools,
            })
            .await?;
        self.emit(
            ProvisionPhase::Orchestrator,
            &orchestrator_spec.name,
            Some(&created_orchestrator.id),
        );

        Ok(FleetRecord {
            orchestrator: AgentRecord {
                id: created_orchestrator.id,
                name: created_orchestrator.name,
                model: orchestrator_spec.model.clone(),
                is_orchestrator: true,
                tools: Vec::new(),
                connected_agents: orchestrator_spec.connected_agents.clone(),
            },
            sub_agents: remote_ids,
        })
    }

    fn resolve_instructions(
        &self,
        spec: &AgentSpec,
        prompts: &HashMap<String, String>,
        graph_name: &str,
        sources: &DataSourceMap,
    ) -> Result<String> {
        if let Some(text) = prompts.get(&spec.name) {
            return Ok(text.clone());
        }
        let Some(instructions_ref) = &spec.instructions_ref else {
            return Ok(format!("You are {}.", spec.name));
        };
        let tag = connector_tag(&sources.graph.connector);
        let substitutions = PromptSubstitutions {
            graph_name: Some(graph_name.to_string()),
            scenario_prefix: None,
        };
        compose_instructions(Path::new(instructions_ref), tag, &substitutions)
    }

    fn build_tool_set(
        &self,
        spec: &AgentSpec,
        api_base_url: &str,
        search_connection_id: &str,
        sources: &DataSourceMap,
    ) -> Result<Vec<ToolDefinition>> {
        let mut tools = Vec::new();
        for tool_name in &spec.tools {
            match tool_name.as_str() {
                "query_graph" => {
                    let guidance = guidance_for(&sources.graph.connector);
                    let spec_value = render_spec(
                        GRAPH_TEMPLATE,
                        api_base_url,
                        guidance.query_language_description,
                        Some("/query/graph"),
                    )?;
                    tools.push(ToolDefinition(json!({
                        "type": "openapi",
                        "openapi": {
                            "name": "query_graph",
                            "description": graph_tool_description(&sources.graph.connector),
                            "spec": spec_value,
                            "auth": { "type": "anonymous" },
                        },
                    })));
                }
                "query_telemetry" => {
                    let guidance = guidance_for(&sources.telemetry.connector);
                    let spec_value = render_spec(
                        TELEMETRY_TEMPLATE,
                        api_base_url,
                        guidance.telemetry_query_language_description,
                        Some("/query/telemetry"),
                    )?;
                    tools.push(ToolDefinition(json!({
                        "type": "openapi",
                        "openapi": {
                            "name": "query_telemetry",
                            "description": "Execute a query against telemetry data.",
                            "spec": spec_value,
                            "auth": { "type": "anonymous" },
                        },
                    })));
                }
                other if other.starts_with("search_") => {
                    let index_key = other.trim_start_matches("search_");
                    let index_name = sources.search_indexes.get(index_key).ok_or_else(|| {
                        Error::Config(format!("no search index configured for {index_key}"))
                    })?;
                    tools.push(ToolDefinition(json!({
                        "type": "azure_ai_search",
                        "azure_ai_search": {
                            "index_connection_id": search_connection_id,
                            "index_name": index_name,
                            "query_type": "semantic",
                            "top_k": 5,
                        },
                    })));
                }
                "dispatch_field_engineer" => tools.push(dispatch_field_engineer_tool()),
                other => {
                    return Err(Error::Config(format!("unknown tool requested by agent spec: {other}")))
                }
            }
        }
        Ok(tools)
    }
}

fn dispatch_field_engineer_tool() -> ToolDefinition {
    ToolDefinition(json!({
        "type": "function",
        "function": {
            "name": "dispatch_field_engineer",
            "description": "Dispatch a field engineer to a physical site to investigate a \
                network incident. Composes a dispatch notification with incident details, \
                exact GPS coordinates, and an inspection checklist. Call this after \
                identifying a physical root cause, locating the fault via sensors, and \
                finding the nearest on-duty engineer from the duty roster.",
            "parameters": {
                "type": "object",
                "properties": {
                    "engineer_name": { "type": "string", "description": "Full name from duty roster" },
                    "engineer_email": { "type": "string", "description": "Email address from duty roster" },
                    "engineer_phone": { "type": "string", "description": "Phone number from duty roster" },
                    "incident_summary": { "type": "string", "description": "Brief incident summary" },
                    "destination_description": { "type": "string", "description": "Human-readable location description" },
                    "destination_latitude": { "type": "number", "description": "GPS latitude (WGS84)" },
                    "destination_longitude": { "type": "number", "description": "GPS longitude (WGS84)" },
                    "physical_signs_to_inspect": { "type": "string", "description": "Inspection checklist for what to look for on arrival" },
                    "sensor_ids": { "type": "string", "description": "Comma-separated triggering sensor IDs" },
                    "urgency": { "type": "string", "enum": ["CRITICAL", "HIGH", "STANDARD"], "description": "Urgency level" },
                },
                "required": [
                    "engineer_name", "engineer_email", "engineer_phone",
                    "incident_summary", "destination_description",
                    "destination_latitude", "destination_longitude",
                    "physical_signs_to_inspect", "sensor_ids",
                ],
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inv_domain::model::{BackendBinding, BackendConfig};
    use std::sync::Mutex;

    struct FakeClient {
        existing: Vec<crate::client::RemoteAgent>,
        created: Mutex<Vec<CreateAgentRequest>>,
        deleted: Mutex<Vec<String>>,
        next_id: Mutex<u32>,
    }

    #[async_trait]
    impl RemoteAgentClient for FakeClient {
        async fn list_agents(&self) -> Result<Vec<crate::client::RemoteAgent>> {
            Ok(self.existing.clone())
        }
        async fn create_agent(&self, request: CreateAgentRequest) -> Result<crate::client::RemoteAgent> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = format!("agent-{next_id}");
            self.created.lock().unwrap().push(request.clone());
            Ok(crate::client::RemoteAgent {
                id,
                name: request.name,
            })
        }
        async fn delete_agent(&self, id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn manifest() -> ScenarioManifest {
        ScenarioManifest {
            name: "telco-outage".into(),
            display_name: "Telco Outage".into(),
            agents: vec![
                AgentSpec {
                    name: "GraphExplorerAgent".into(),
                    role: "graph".into(),
                    model: "gpt-4.1".into(),
                    tools: vec!["query_graph".into()],
                    is_orchestrator: false,
                    connected_agents: vec![],
                    instructions_ref: None,
                },
                AgentSpec {
                    name: "TelemetryAgent".into(),
                    role: "telemetry".into(),
                    model: "gpt-4.1".into(),
                    tools: vec!["query_telemetry".into()],
                    is_orchestrator: false,
                    connected_agents: vec![],
                    instructions_ref: None,
                },
                AgentSpec {
                    name: "Orchestrator".into(),
                    role: "orchestrator".into(),
                    model: "gpt-4.1".into(),
                    tools: vec!["dispatch_field_engineer".into()],
                    is_orchestrator: true,
                    connected_agents: vec!["GraphExplorerAgent".into(), "TelemetryAgent".into()],
                    instructions_ref: None,
                },
            ],
            data_sources: DataSourceMap {
                graph: BackendBinding {
                    connector: "fabric-gql".into(),
                    config: BackendConfig::default(),
                },
                telemetry: BackendBinding {
                    connector: "fabric-kql".into(),
                    config: BackendConfig::default(),
                },
                search_indexes: HashMap::new(),
            },
            example_questions: vec![],
        }
    }

    #[tokio::test]
    async fn cleanup_deletes_matching_names_only() {
        let client = FakeClient {
            existing: vec![
                crate::client::RemoteAgent {
                    id: "a1".into(),
                    name: "Orchestrator".into(),
                },
                crate::client::RemoteAgent {
                    id: "a2".into(),
                    name: "UnrelatedAgent".into(),
                },
            ],
            created: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
            next_id: Mutex::new(0),
        };
        let provisioner = AgentProvisioner::new(Box::new(client));
        let deleted = provisioner
            .cleanup_by_name(&["Orchestrator".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn provisions_specialists_then_orchestrator_with_connected_tools() {
        let client = FakeClient {
            existing: vec![],
            created: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
            next_id: Mutex::new(0),
        };
        let provisioner = AgentProvisioner::new(Box::new(client));
        let fleet = provisioner
            .provision_from_config(&manifest(), "https://api.example", "conn-1", "incident-graph", &HashMap::new())
            .await
            .unwrap();

        assert_eq!(fleet.orchestrator.name, "Orchestrator");
        assert_eq!(fleet.sub_agents.len(), 2);
        assert_eq!(
            fleet.remote_id_for("GraphExplorerAgent"),
            Some(fleet.sub_agents["GraphExplorerAgent"].id.as_str())
        );
    }

    #[tokio::test]
    async fn rejects_unknown_tool_name() {
        let mut bad_manifest = manifest();
        bad_manifest.agents[0].tools = vec!["query_unobtainium".into()];
        let client = FakeClient {
            existing: vec![],
            created: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
            next_id: Mutex::new(0),
        };
        let provisioner = AgentProvisioner::new(Box::new(client));
        let err = provisioner
            .provision_from_config(&bad_manifest, "https://api.example", "conn-1", "incident-graph", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
