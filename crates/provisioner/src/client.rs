//! Abstraction over the remote agent-hosting service, so the provisioning
//! algorithm can be exercised without a live project endpoint.

use async_trait::async_trait;
use inv_domain::Result;
use serde_json::Value;

/// One tool definition as the remote service expects it — already in wire
/// shape (OpenAPI tool, search tool, connected-agent tool, or function
/// tool), so the client stays a thin transport and the provisioner owns
/// all tool-construction logic.
#[derive(Debug, Clone)]
pub struct ToolDefinition(pub Value);

#[derive(Debug, Clone)]
pub struct CreateAgentRequest {
    pub model: String,
    pub name: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone)]
pub struct RemoteAgent {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait RemoteAgentClient: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<RemoteAgent>>;
    async fn create_agent(&self, request: CreateAgentRequest) -> Result<RemoteAgent>;
    async fn delete_agent(&self, id: &str) -> Result<()>;
}
