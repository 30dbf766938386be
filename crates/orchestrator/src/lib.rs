pub mod events;
pub mod remote;
pub mod runtime;

pub use events::{RawCallback, ToolCallKind, ToolCallResult};
pub use remote::{MockAgentRuntime, RemoteAgentRuntime};
pub use runtime::{resolve_agent_name, OrchestratorRuntime, RunInput};
