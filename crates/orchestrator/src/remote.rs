//! Abstraction over the remote agent-hosting service's thread-run API, so
//! the orchestrator's event-translation and retry logic can be exercised
//! without a live project endpoint.

use async_trait::async_trait;
use inv_domain::Result;
use inv_provisioner::FleetRecord;
use tokio::sync::mpsc;

use crate::events::{RawCallback, ToolCallKind, ToolCallResult};

#[async_trait]
pub trait RemoteAgentRuntime: Send + Sync {
    /// Drive one thread run to completion, pushing [`RawCallback`]s onto
    /// `emit` as they occur. `thread_id` is `None` on a session's first
    /// turn; the implementation creates one and pushes it as the first
    /// [`RawCallback::ThreadRunInProgress`].
    async fn drive_run(
        &self,
        thread_id: Option<String>,
        user_message: &str,
        fleet: &FleetRecord,
        emit: mpsc::Sender<RawCallback>,
    ) -> Result<()>;
}

/// Offline stand-in for the remote agent-hosting service: delegates to
/// each connected sub-agent in turn with a canned response instead of an
/// actual model call. Exists for the same reason `mock-graph`/
/// `mock-telemetry` backends exist — offline demos and tests against a
/// scenario with no live agent-hosting project configured.
pub struct MockAgentRuntime;

#[async_trait]
impl RemoteAgentRuntime for MockAgentRuntime {
    async fn drive_run(
        &self,
        thread_id: Option<String>,
        user_message: &str,
        fleet: &FleetRecord,
        emit: mpsc::Sender<RawCallback>,
    ) -> Result<()> {
        let thread_id = thread_id.unwrap_or_else(|| format!("mock-thread-{}", fleet.orchestrator.id));
        emit.send(RawCallback::ThreadRunInProgress { thread_id })
            .await
            .map_err(|_| inv_domain::Error::RunFailed("event channel closed".into()))?;

        let mut agents: Vec<&str> = fleet.sub_agents.keys().map(String::as_str).collect();
        agents.sort_unstable();

        if agents.is_empty() {
            emit.send(RawCallback::ThreadRunFailed {
                message: "fleet has no sub-agents to delegate to".into(),
            })
            .await
            .map_err(|_| inv_domain::Error::RunFailed("event channel closed".into()))?;
            return Ok(());
        }

        for agent in &agents {
            emit.send(RawCallback::RunStepInProgress)
                .await
                .map_err(|_| inv_domain::Error::RunFailed("event channel closed".into()))?;

            let tool_call = ToolCallResult {
                kind: ToolCallKind::ConnectedAgent,
                agent: (*agent).to_string(),
                query: format!("investigate: {user_message}"),
                response: "{\"note\": \"mock response, no live agent-hosting project configured\"}"
                    .to_string(),
                duration_ms: 10,
                error: false,
            };

            emit.send(RawCallback::RunStepCompleted {
                tool_calls: vec![tool_call],
            })
            .await
            .map_err(|_| inv_domain::Error::RunFailed("event channel closed".into()))?;
        }

        emit.send(RawCallback::MessageDelta {
            text: format!(
                "Mock diagnosis for \"{user_message}\": consulted {} agent(s); no live agent-hosting project is configured for this deployment.",
                agents.len()
            ),
        })
        .await
        .map_err(|_| inv_domain::Error::RunFailed("event channel closed".into()))?;

        emit.send(RawCallback::ThreadRunCompleted { total_tokens: 0 })
            .await
            .map_err(|_| inv_domain::Error::RunFailed("event channel closed".into()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inv_provisioner::AgentRecord;
    use std::collections::HashMap;

    fn fleet() -> FleetRecord {
        FleetRecord {
            orchestrator: AgentRecord {
                id: "orch-1".into(),
                name: "Orchestrator".into(),
                model: "mock".into(),
                is_orchestrator: true,
                tools: vec![],
                connected_agents: vec!["GraphExplorerAgent".into()],
            },
            sub_agents: HashMap::from([(
                "GraphExplorerAgent".to_string(),
                AgentRecord {
                    id: "ge-1".into(),
                    name: "GraphExplorerAgent".into(),
                    model: "mock".into(),
                    is_orchestrator: false,
                    tools: vec!["query_graph".into()],
                    connected_agents: vec![],
                },
            )]),
        }
    }

    #[tokio::test]
    async fn drives_one_step_per_sub_agent() {
        let (tx, mut rx) = mpsc::channel(16);
        MockAgentRuntime
            .drive_run(None, "alert", &fleet(), tx)
            .await
            .unwrap();

        let mut saw_step = false;
        let mut saw_complete = false;
        while let Some(cb) = rx.recv().await {
            match cb {
                RawCallback::RunStepCompleted { tool_calls } => {
                    assert_eq!(tool_calls.len(), 1);
                    saw_step = true;
                }
                RawCallback::ThreadRunCompleted { .. } => saw_complete = true,
                _ => {}
            }
        }
        assert!(saw_step && saw_complete);
    }

    #[tokio::test]
    async fn drives_one_step_pair_per_sub_agent_in_a_two_agent_fleet() {
        let mut two_agents = fleet();
        two_agents.sub_agents.insert(
            "TelemetryAgent".to_string(),
            AgentRecord {
                id: "tel-1".into(),
                name: "TelemetryAgent".into(),
                model: "mock".into(),
                is_orchestrator: false,
                tools: vec!["query_telemetry".into()],
                connected_agents: vec![],
            },
        );

        let (tx, mut rx) = mpsc::channel(16);
        MockAgentRuntime
            .drive_run(None, "alert", &two_agents, tx)
            .await
            .unwrap();

        let mut in_progress_count = 0;
        let mut completed_agents = Vec::new();
        while let Some(cb) = rx.recv().await {
            match cb {
                RawCallback::RunStepInProgress => in_progress_count += 1,
                RawCallback::RunStepCompleted { tool_calls } => {
                    assert_eq!(tool_calls.len(), 1);
                    completed_agents.push(tool_calls[0].agent.clone());
                }
                _ => {}
            }
        }
        assert_eq!(in_progress_count, 2);
        assert_eq!(completed_agents.len(), 2);
        assert!(completed_agents.contains(&"GraphExplorerAgent".to_string()));
        assert!(completed_agents.contains(&"TelemetryAgent".to_string()));
    }

    #[tokio::test]
    async fn empty_fleet_fails_the_run() {
        let mut empty = fleet();
        empty.sub_agents.clear();
        let (tx, mut rx) = mpsc::channel(16);
        MockAgentRuntime.drive_run(None, "alert", &empty, tx).await.unwrap();

        let mut saw_failure = false;
        while let Some(cb) = rx.recv().await {
            if matches!(cb, RawCallback::ThreadRunFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }
}
