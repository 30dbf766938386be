//! Drives a remote agent thread to completion and translates its
//! callback-driven streaming protocol into a strictly-ordered sequence of
//! [`SSEEvent`]s.
//!
//! The worker is a `tokio::spawn`-ed task, not an OS thread: the mock and
//! HTTP-polling agent backends this runtime targets are already
//! non-blocking, so a plain spawned task driving a bounded channel
//! suffices (a real blocking SDK would additionally need
//! `spawn_blocking`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use inv_domain::cancel::CancelToken;
use inv_domain::config::OrchestratorConfig;
use inv_domain::sse::{truncate_with_ellipsis, SSEEvent};
use inv_provisioner::FleetRecord;
use tokio::sync::mpsc;

use crate::events::{RawCallback, ToolCallKind, ToolCallResult};
use crate::remote::RemoteAgentRuntime;

pub struct RunInput {
    pub run_id: String,
    pub alert_text: String,
    pub user_message: String,
    pub thread_id: Option<String>,
    pub turn: u32,
    pub fleet: Option<Arc<FleetRecord>>,
}

#[derive(Clone)]
pub struct OrchestratorRuntime {
    config: OrchestratorConfig,
    remote: Arc<dyn RemoteAgentRuntime>,
}

impl OrchestratorRuntime {
    pub fn new(config: OrchestratorConfig, remote: Arc<dyn RemoteAgentRuntime>) -> Self {
        Self { config, remote }
    }

    /// Spawn the worker task and return the bounded event channel the
    /// caller forwards directly to its HTTP SSE response.
    pub fn run(&self, input: RunInput, cancel: CancelToken) -> mpsc::Receiver<SSEEvent> {
        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity);
        let config = self.config.clone();
        let remote = self.remote.clone();
        tokio::spawn(async move {
            drive(config, remote, input, cancel, tx).await;
        });
        rx
    }
}

/// Outcome of one attempt, distinguishing a clean completion from the
/// various ways an attempt can fail or come back empty.
enum AttemptOutcome {
    Completed {
        thread_id: String,
        steps: u64,
        tokens: u64,
        message: String,
    },
    Failed {
        thread_id: Option<String>,
        detail: String,
    },
}

async fn drive(
    config: OrchestratorConfig,
    remote: Arc<dyn RemoteAgentRuntime>,
    input: RunInput,
    cancel: CancelToken,
    tx: mpsc::Sender<SSEEvent>,
) {
    let turn = input.turn;
    let turn_tag = if turn == 0 { None } else { Some(turn) };

    let Some(fleet) = input.fleet else {
        let _ = tx
            .send(SSEEvent::Error {
                message: "investigation fleet not configured — run provisioning first".into(),
                turn: turn_tag,
            })
            .await;
        return;
    };

    let _ = tx
        .send(SSEEvent::RunStart {
            run_id: input.run_id.clone(),
            alert: input.alert_text.clone(),
            timestamp: chrono::Utc::now(),
            turn: turn_tag,
        })
        .await;

    let mut thread_id = input.thread_id.clone();
    let mut next_message = input.user_message.clone();
    let mut step_index: u64 = 0;
    let mut total_tokens: u64 = 0;
    let started_at = Instant::now();
    let watchdog = Duration::from_secs(config.stall_watchdog_secs);

    for attempt in 1..=config.max_run_attempts {
        if cancel.is_cancelled() {
            let _ = tx
                .send(SSEEvent::Error {
                    message: "investigation cancelled".into(),
                    turn: turn_tag,
                })
                .await;
            return;
        }

        let outcome = run_one_attempt(
            &config,
            remote.clone(),
            thread_id.clone(),
            &next_message,
            &fleet,
            &cancel,
            &tx,
            turn_tag,
            &mut step_index,
            watchdog,
        )
        .await;

        match outcome {
            AttemptOutcome::Completed {
                thread_id: observed_thread_id,
                steps,
                tokens,
                message,
            } => {
                if turn == 0 {
                    let _ = tx
                        .send(SSEEvent::ThreadCreated {
                            thread_id: observed_thread_id.clone(),
                            turn: turn_tag,
                        })
                        .await;
                }
                thread_id = Some(observed_thread_id);
                total_tokens += tokens;
                if !message.is_empty() {
                    let _ = tx
                        .send(SSEEvent::Message {
                            text: message,
                            turn: turn_tag,
                        })
                        .await;
                }
                let _ = tx
                    .send(SSEEvent::RunComplete {
                        steps,
                        tokens: total_tokens,
                        time: format!("{:.1}s", started_at.elapsed().as_secs_f64()),
                        turn: turn_tag,
                    })
                    .await;
                return;
            }
            AttemptOutcome::Failed {
                thread_id: observed_thread_id,
                detail,
            } => {
                if observed_thread_id.is_some() {
                    thread_id = observed_thread_id;
                }
                if attempt >= config.max_run_attempts {
                    let _ = tx
                        .send(SSEEvent::Error {
                            message: detail,
                            turn: turn_tag,
                        })
                        .await;
                    return;
                }
                let _ = tx
                    .send(SSEEvent::StepThinking {
                        agent: "Orchestrator".into(),
                        status: format!("Retrying ({}/{})", attempt + 1, config.max_run_attempts),
                        turn: turn_tag,
                    })
                    .await;
                next_message = format!(
                    "The previous attempt failed: {detail}. Try a simpler query or skip a \
                     data source that is not responding."
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_attempt(
    config: &OrchestratorConfig,
    remote: Arc<dyn RemoteAgentRuntime>,
    thread_id: Option<String>,
    user_message: &str,
    fleet: &FleetRecord,
    cancel: &CancelToken,
    tx: &mpsc::Sender<SSEEvent>,
    turn_tag: Option<u32>,
    step_index: &mut u64,
    watchdog: Duration,
) -> AttemptOutcome {
    let (callback_tx, mut callback_rx) = mpsc::channel(32);
    let driver_remote = remote.clone();
    let driver_fleet = fleet.clone();
    let driver_message = user_message.to_string();
    let driver_thread_id = thread_id.clone();
    let driver = tokio::spawn(async move {
        driver_remote
            .drive_run(driver_thread_id, &driver_message, &driver_fleet, callback_tx)
            .await
    });

    let mut observed_thread_id: Option<String> = None;
    let mut message_buffer = String::new();
    let mut total_tokens = 0u64;

    loop {
        if cancel.is_cancelled() {
            driver.abort();
            return AttemptOutcome::Failed {
                thread_id: observed_thread_id,
                detail: "cancelled".into(),
            };
        }

        let received = tokio::time::timeout(watchdog, callback_rx.recv()).await;
        let callback = match received {
            Ok(Some(callback)) => callback,
            Ok(None) => break,
            Err(_) => {
                driver.abort();
                return AttemptOutcome::Failed {
                    thread_id: observed_thread_id,
                    detail: inv_domain::Error::StallDetected {
                        secs: watchdog.as_secs(),
                    }
                    .to_string(),
                };
            }
        };

        match callback {
            RawCallback::ThreadRunInProgress { thread_id } => {
                observed_thread_id = Some(thread_id);
            }
            RawCallback::RunStepInProgress => {
                let _ = tx
                    .send(SSEEvent::StepThinking {
                        agent: "Orchestrator".into(),
                        status: "thinking".into(),
                        turn: turn_tag,
                    })
                    .await;
            }
            RawCallback::RunStepCompleted { tool_calls } => {
                emit_tool_calls(tx, tool_calls, false, turn_tag, config, step_index).await;
            }
            RawCallback::RunStepFailed { tool_calls } => {
                emit_tool_calls(tx, tool_calls, true, turn_tag, config, step_index).await;
            }
            RawCallback::MessageDelta { text } => {
                message_buffer.push_str(&text);
            }
            RawCallback::ThreadRunCompleted { total_tokens: tokens } => {
                total_tokens = tokens;
                break;
            }
            RawCallback::ThreadRunFailed { message } => {
                return AttemptOutcome::Failed {
                    thread_id: observed_thread_id,
                    detail: message,
                };
            }
        }
    }

    match driver.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return AttemptOutcome::Failed {
                thread_id: observed_thread_id,
                detail: e.to_string(),
            }
        }
        Err(e) => {
            return AttemptOutcome::Failed {
                thread_id: observed_thread_id,
                detail: format!("driver task panicked: {e}"),
            }
        }
    }

    let Some(thread_id) = observed_thread_id else {
        return AttemptOutcome::Failed {
            thread_id: None,
            detail: "run completed with no thread id".into(),
        };
    };

    if *step_index == 0 && message_buffer.is_empty() {
        return AttemptOutcome::Failed {
            thread_id: Some(thread_id),
            detail: inv_domain::Error::NoResponse.to_string(),
        };
    }

    AttemptOutcome::Completed {
        thread_id,
        steps: *step_index,
        tokens: total_tokens,
        message: message_buffer,
    }
}

async fn emit_tool_calls(
    tx: &mpsc::Sender<SSEEvent>,
    tool_calls: Vec<ToolCallResult>,
    failed: bool,
    turn_tag: Option<u32>,
    config: &OrchestratorConfig,
    step_index: &mut u64,
) {
    for call in tool_calls {
        *step_index += 1;
        let step = *step_index;
        let _ = tx
            .send(SSEEvent::StepStart {
                step,
                agent: call.agent.clone(),
                turn: turn_tag,
            })
            .await;

        let query = truncate_with_ellipsis(&call.query, config.query_truncate_chars);
        let response = if failed || call.error {
            format!("FAILED: {}", truncate_with_ellipsis(&call.response, config.response_truncate_chars))
        } else {
            truncate_with_ellipsis(&call.response, config.response_truncate_chars)
        };

        let _ = tx
            .send(SSEEvent::StepComplete {
                step,
                agent: call.agent,
                duration: format!("{:.1}s", call.duration_ms as f64 / 1000.0),
                query,
                response,
                error: failed || call.error,
                turn: turn_tag,
            })
            .await;
    }
}

/// Resolves a connected-agent call's remote id to its display name using
/// the fleet record produced by provisioning.
pub fn resolve_agent_name(fleet: &FleetRecord, remote_id: &str) -> Option<String> {
    if fleet.orchestrator.id == remote_id {
        return Some(fleet.orchestrator.name.clone());
    }
    fleet
        .sub_agents
        .values()
        .find(|a| a.id == remote_id)
        .map(|a| a.name.clone())
}

pub fn tool_call_kind_tag(kind: ToolCallKind) -> &'static str {
    match kind {
        ToolCallKind::ConnectedAgent => "connected-agent",
        ToolCallKind::Search => "search",
        ToolCallKind::OpenApi => "openapi",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inv_provisioner::AgentRecord;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fleet() -> Arc<FleetRecord> {
        Arc::new(FleetRecord {
            orchestrator: AgentRecord {
                id: "orch-1".into(),
                name: "Orchestrator".into(),
                model: "gpt-4.1".into(),
                is_orchestrator: true,
                tools: vec![],
                connected_agents: vec!["GraphExplorerAgent".into()],
            },
            sub_agents: HashMap::from([(
                "GraphExplorerAgent".to_string(),
                AgentRecord {
                    id: "ge-1".into(),
                    name: "GraphExplorerAgent".into(),
                    model: "gpt-4.1".into(),
                    is_orchestrator: false,
                    tools: vec!["query_graph".into()],
                    connected_agents: vec![],
                },
            )]),
        })
    }

    struct HappyPathRuntime;

    #[async_trait]
    impl RemoteAgentRuntime for HappyPathRuntime {
        async fn drive_run(
            &self,
            thread_id: Option<String>,
            _user_message: &str,
            _fleet: &FleetRecord,
            emit: mpsc::Sender<RawCallback>,
        ) -> inv_domain::Result<()> {
            let thread_id = thread_id.unwrap_or_else(|| "thread-abc".to_string());
            emit.send(RawCallback::ThreadRunInProgress { thread_id }).await.unwrap();
            emit.send(RawCallback::RunStepInProgress).await.unwrap();
            emit.send(RawCallback::RunStepCompleted {
                tool_calls: vec![ToolCallResult {
                    kind: ToolCallKind::ConnectedAgent,
                    agent: "GraphExplorerAgent".into(),
                    query: "MATCH (n) RETURN n".into(),
                    response: "{\"rows\": []}".into(),
                    duration_ms: 420,
                    error: false,
                }],
            })
            .await
            .unwrap();
            emit.send(RawCallback::MessageDelta { text: "Root cause: fibre cut.".into() })
                .await
                .unwrap();
            emit.send(RawCallback::ThreadRunCompleted { total_tokens: 512 })
                .await
                .unwrap();
            Ok(())
        }
    }

    struct AlwaysFailsRuntime {
        attempts: Arc<AtomicU32>,
    }

    #[async_trait]
    impl RemoteAgentRuntime for AlwaysFailsRuntime {
        async fn drive_run(
            &self,
            thread_id: Option<String>,
            _user_message: &str,
            _fleet: &FleetRecord,
            emit: mpsc::Sender<RawCallback>,
        ) -> inv_domain::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let thread_id = thread_id.unwrap_or_else(|| "thread-abc".to_string());
            emit.send(RawCallback::ThreadRunInProgress { thread_id }).await.unwrap();
            emit.send(RawCallback::ThreadRunFailed { message: "backend unavailable".into() })
                .await
                .unwrap();
            Ok(())
        }
    }

    async fn drain(mut rx: mpsc::Receiver<SSEEvent>) -> Vec<SSEEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn happy_path_emits_full_event_sequence_and_terminates() {
        let runtime = OrchestratorRuntime::new(OrchestratorConfig::default(), Arc::new(HappyPathRuntime));
        let rx = runtime.run(
            RunInput {
                run_id: "run-1".into(),
                alert_text: "fibre link down".into(),
                user_message: "fibre link down".into(),
                thread_id: None,
                turn: 0,
                fleet: Some(fleet()),
            },
            CancelToken::new(),
        );
        let events = drain(rx).await;

        assert!(matches!(events[0], SSEEvent::RunStart { .. }));
        assert!(events.iter().any(|e| matches!(e, SSEEvent::ThreadCreated { .. })));
        assert!(events.iter().any(|e| matches!(e, SSEEvent::StepComplete { .. })));
        assert!(events.iter().any(|e| matches!(e, SSEEvent::Message { .. })));
        assert!(matches!(events.last().unwrap(), SSEEvent::RunComplete { .. }));
    }

    #[tokio::test]
    async fn missing_fleet_emits_single_error() {
        let runtime = OrchestratorRuntime::new(OrchestratorConfig::default(), Arc::new(HappyPathRuntime));
        let rx = runtime.run(
            RunInput {
                run_id: "run-1".into(),
                alert_text: "alert".into(),
                user_message: "alert".into(),
                thread_id: None,
                turn: 0,
                fleet: None,
            },
            CancelToken::new(),
        );
        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SSEEvent::Error { .. }));
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_final_error_after_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let runtime = OrchestratorRuntime::new(
            OrchestratorConfig::default(),
            Arc::new(AlwaysFailsRuntime { attempts: attempts.clone() }),
        );
        let rx = runtime.run(
            RunInput {
                run_id: "run-1".into(),
                alert_text: "alert".into(),
                user_message: "alert".into(),
                thread_id: None,
                turn: 0,
                fleet: Some(fleet()),
            },
            CancelToken::new(),
        );
        let events = drain(rx).await;
        assert!(matches!(events.last().unwrap(), SSEEvent::Error { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(events.iter().any(|e| matches!(e, SSEEvent::StepThinking { status, .. } if status.starts_with("Retrying"))));
    }
}
