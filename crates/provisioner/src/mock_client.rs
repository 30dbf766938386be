//! Offline stand-in for the remote agent-hosting service's agent CRUD
//! surface, so [`crate::provisioner::AgentProvisioner`] can be exercised
//! end-to-end without a live project endpoint. Mirrors
//! `inv_orchestrator::MockAgentRuntime`'s role on the run side.

use async_trait::async_trait;
use inv_domain::Result;
use parking_lot::Mutex;

use crate::client::{CreateAgentRequest, RemoteAgent, RemoteAgentClient};

struct Entry {
    id: String,
    name: String,
}

/// Assigns deterministic ids (`mock-agent-{n}`) and tracks created agents
/// in memory so `list_agents`/`delete_agent` behave like a real directory.
pub struct MockAgentClient {
    next_id: Mutex<u64>,
    agents: Mutex<Vec<Entry>>,
}

impl MockAgentClient {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            agents: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MockAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteAgentClient for MockAgentClient {
    async fn list_agents(&self) -> Result<Vec<RemoteAgent>> {
        Ok(self
            .agents
            .lock()
            .iter()
            .map(|e| RemoteAgent {
                id: e.id.clone(),
                name: e.name.clone(),
            })
            .collect())
    }

    async fn create_agent(&self, request: CreateAgentRequest) -> Result<RemoteAgent> {
        let mut next_id = self.next_id.lock();
        let id = format!("mock-agent-{}", *next_id);
        *next_id += 1;
        drop(next_id);

        self.agents.lock().push(Entry {
            id: id.clone(),
            name: request.name.clone(),
        });

        Ok(RemoteAgent {
            id,
            name: request.name,
        })
    }

    async fn delete_agent(&self, id: &str) -> Result<()> {
        self.agents.lock().retain(|e| e.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ToolDefinition;

    fn request(name: &str) -> CreateAgentRequest {
        CreateAgentRequest {
            model: "mock".into(),
            name: name.into(),
            instructions: "do the thing".into(),
            tools: Vec::<ToolDefinition>::new(),
        }
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let client = MockAgentClient::new();
        let created = client.create_agent(request("Orchestrator")).await.unwrap();
        assert_eq!(created.name, "Orchestrator");

        let listed = client.list_agents().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
    }

    #[tokio::test]
    async fn ids_are_unique_across_creates() {
        let client = MockAgentClient::new();
        let a = client.create_agent(request("A")).await.unwrap();
        let b = client.create_agent(request("B")).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn delete_removes_from_listing() {
        let client = MockAgentClient::new();
        let created = client.create_agent(request("A")).await.unwrap();
        client.delete_agent(&created.id).await.unwrap();
        assert!(client.list_agents().await.unwrap().is_empty());
    }
}
