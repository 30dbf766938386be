pub mod catalog;
pub mod client;
pub mod mock_client;
pub mod model;
pub mod openapi;
pub mod provisioner;
pub mod prompts;

pub use client::{CreateAgentRequest, RemoteAgent, RemoteAgentClient, ToolDefinition};
pub use mock_client::MockAgentClient;
pub use model::{AgentRecord, FleetRecord, ProgressEvent, ProvisionPhase};
pub use provisioner::AgentProvisioner;
