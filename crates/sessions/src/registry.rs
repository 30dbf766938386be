//! SessionRegistry — session identity, admission control, idle expiry, and
//! durable recording, bound to the OrchestratorRuntime task that drives
//! each turn.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use inv_domain::cancel::CancelToken;
use inv_domain::config::SessionsConfig;
use inv_domain::{Error, Result};
use inv_domain::ids::new_session_id;
use inv_domain::model::{Session, SessionStatus, SessionSummary};
use inv_domain::sse::SSEEvent;
use inv_domain::trace::TraceEvent;
use inv_orchestrator::{OrchestratorRuntime, RunInput};
use inv_provisioner::FleetRecord;

use crate::store::SessionStore;

/// Capacity of each session's live-event broadcast channel. Late
/// subscribers only see events emitted after they subscribe; the
/// session's own state (steps, diagnosis) always reflects everything
/// observed so far regardless of when a client attaches.
const EVENT_BROADCAST_CAPACITY: usize = 64;

struct ActiveEntry {
    session: Mutex<Session>,
    cancel: CancelToken,
    events: broadcast::Sender<SSEEvent>,
    idle_timer: Mutex<Option<JoinHandle<()>>>,
}

/// Bounded insertion-ordered cache of finalized sessions: oldest is
/// evicted on overflow.
struct RecentCache {
    capacity: usize,
    order: VecDeque<String>,
    sessions: HashMap<String, Session>,
}

impl RecentCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            sessions: HashMap::new(),
        }
    }

    fn insert(&mut self, session: Session) {
        let id = session.id.clone();
        if self.sessions.insert(id.clone(), session).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.sessions.remove(&oldest);
            }
        }
    }

    fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).cloned()
    }

    /// Newest-first.
    fn list(&self, scenario: Option<&str>) -> Vec<Session> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.sessions.get(id))
            .filter(|s| scenario.is_none_or(|sc| s.scenario == sc))
            .cloned()
            .collect()
    }
}

pub struct SessionRegistry {
    config: SessionsConfig,
    runtime: Arc<OrchestratorRuntime>,
    fleets: HashMap<String, Arc<FleetRecord>>,
    store: Arc<dyn SessionStore>,
    active: Mutex<HashMap<String, Arc<ActiveEntry>>>,
    recent: Mutex<RecentCache>,
}

impl SessionRegistry {
    pub fn new(
        config: SessionsConfig,
        runtime: Arc<OrchestratorRuntime>,
        fleets: HashMap<String, Arc<FleetRecord>>,
        store: Arc<dyn SessionStore>,
    ) -> Arc<Self> {
        let max_recent = config.max_recent;
        Arc::new(Self {
            config,
            runtime,
            fleets,
            store,
            active: Mutex::new(HashMap::new()),
            recent: Mutex::new(RecentCache::new(max_recent)),
        })
    }

    /// Create a fresh `Pending` session. Fails with `CapacityExceeded` once
    /// the active ceiling is reached, or `ScenarioUnknown` if no fleet is
    /// provisioned for the scenario.
    pub fn create(&self, scenario: &str, alert_text: &str) -> Result<Session> {
        if !self.fleets.contains_key(scenario) {
            return Err(Error::ScenarioUnknown(scenario.to_owned()));
        }

        let mut active = self.active.lock().unwrap();
        if active.len() >= self.config.max_active {
            return Err(Error::CapacityExceeded {
                max: self.config.max_active,
            });
        }

        let id = new_session_id(Utc::now().timestamp_millis() as u64);
        let session = Session::new(id.clone(), scenario.to_owned(), alert_text.to_owned(), Utc::now());

        let (events_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        active.insert(
            id,
            Arc::new(ActiveEntry {
                session: Mutex::new(session.clone()),
                cancel: CancelToken::new(),
                events: events_tx,
                idle_timer: Mutex::new(None),
            }),
        );

        TraceEvent::SessionCreated {
            session_id: session.id.clone(),
            scenario: scenario.to_owned(),
        }
        .emit();

        Ok(session)
    }

    /// Transition a `Pending` session to `InProgress` and launch its
    /// OrchestratorRuntime task. Non-blocking.
    pub fn start(self: &Arc<Self>, session_id: &str) -> Result<()> {
        let entry = self.require_active(session_id)?;

        {
            let mut session = entry.session.lock().unwrap();
            if session.status != SessionStatus::Pending {
                return Err(Error::UnsupportedOperation(format!(
                    "session {session_id} is not pending"
                )));
            }
            session.status = SessionStatus::InProgress;
            session.updated_at = Utc::now();
        }

        let (alert_text, scenario) = {
            let session = entry.session.lock().unwrap();
            (session.alert_text.clone(), session.scenario.clone())
        };
        let fleet = self.fleets.get(&scenario).cloned();

        let input = RunInput {
            run_id: session_id.to_owned(),
            alert_text: alert_text.clone(),
            user_message: alert_text,
            thread_id: None,
            turn: 0,
            fleet,
        };

        self.spawn_turn(session_id.to_owned(), entry, input);
        Ok(())
    }

    /// Send a follow-up on a `Completed` session, reusing its remote thread
    /// handle. Any pending idle timer is cancelled atomically.
    pub fn continue_session(self: &Arc<Self>, session_id: &str, follow_up_text: &str) -> Result<()> {
        let entry = self.require_active(session_id)?;

        let (thread_id, scenario, turn) = {
            let mut session = entry.session.lock().unwrap();
            if session.status != SessionStatus::Completed {
                return Err(Error::UnsupportedOperation(format!(
                    "session {session_id} is not completed; cannot continue"
                )));
            }
            session.turn_count += 1;
            session.status = SessionStatus::InProgress;
            session.error_detail = None;
            session.updated_at = Utc::now();
            (session.thread_id.clone(), session.scenario.clone(), session.turn_count)
        };

        if let Some(handle) = entry.idle_timer.lock().unwrap().take() {
            handle.abort();
        }

        let fleet = self.fleets.get(&scenario).cloned();
        let input = RunInput {
            run_id: session_id.to_owned(),
            alert_text: follow_up_text.to_owned(),
            user_message: follow_up_text.to_owned(),
            thread_id,
            turn,
            fleet,
        };

        self.spawn_turn(session_id.to_owned(), entry, input);
        Ok(())
    }

    /// Raise the cancel signal for an active session. A no-op if the
    /// session is not active (already finalized).
    pub fn cancel(&self, session_id: &str) -> Result<()> {
        let entry = self.require_active(session_id)?;
        entry.cancel.cancel();
        Ok(())
    }

    /// The session if active or in the recent cache; otherwise the caller
    /// falls back to the durable store.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        if let Some(entry) = self.active.lock().unwrap().get(session_id) {
            return Some(entry.session.lock().unwrap().clone());
        }
        self.recent.lock().unwrap().get(session_id)
    }

    /// Subscribe to live events for an active session. Returns `None` if
    /// the session is not active.
    pub fn subscribe(&self, session_id: &str) -> Option<broadcast::Receiver<SSEEvent>> {
        self.active
            .lock()
            .unwrap()
            .get(session_id)
            .map(|entry| entry.events.subscribe())
    }

    /// Active sessions first (most-recently-updated first), then recent
    /// cache entries (newest-finalized first).
    pub fn list(&self, scenario: Option<&str>) -> Vec<SessionSummary> {
        let mut active: Vec<Session> = self
            .active
            .lock()
            .unwrap()
            .values()
            .map(|entry| entry.session.lock().unwrap().clone())
            .filter(|s| scenario.is_none_or(|sc| s.scenario == sc))
            .collect();
        active.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let recent = self.recent.lock().unwrap().list(scenario);

        active
            .iter()
            .chain(recent.iter())
            .map(Session::summary)
            .collect()
    }

    /// In-memory listing merged with a durable-store query, deduplicated by
    /// id with in-memory entries taking precedence.
    pub fn list_with_history(&self, scenario: Option<&str>, limit: usize) -> Vec<SessionSummary> {
        let mut summaries = self.list(scenario);
        let mut seen: std::collections::HashSet<String> =
            summaries.iter().map(|s| s.id.clone()).collect();

        match self.store.list_summaries(scenario, limit) {
            Ok(historical) => {
                for s in historical {
                    if seen.insert(s.id.clone()) {
                        summaries.push(s);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load historical sessions");
            }
        }

        summaries.truncate(limit);
        summaries
    }

    fn require_active(&self, session_id: &str) -> Result<Arc<ActiveEntry>> {
        self.active
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::UnsupportedOperation(format!("session {session_id} is not active")))
    }

    fn spawn_turn(self: &Arc<Self>, session_id: String, entry: Arc<ActiveEntry>, input: RunInput) {
        let registry = Arc::clone(self);
        let cancel = entry.cancel.clone();
        let mut rx = registry.runtime.run(input, cancel);

        tokio::spawn(async move {
            let turn = {
                let session = entry.session.lock().unwrap();
                session.turn_count
            };

            while let Some(event) = rx.recv().await {
                apply_event(&entry.session, turn, &event);
                let _ = entry.events.send(event.clone());
                if event.is_terminal() {
                    break;
                }
            }

            registry.finalize(&session_id).await;
        });
    }

    async fn finalize(self: &Arc<Self>, session_id: &str) {
        let entry = match self.active.lock().unwrap().get(session_id).cloned() {
            Some(entry) => entry,
            None => return,
        };

        let status = {
            let mut session = entry.session.lock().unwrap();
            let status = if entry.cancel.is_cancelled() {
                SessionStatus::Cancelled
            } else if session.error_detail.is_some() && session.diagnosis.is_none() {
                SessionStatus::Failed
            } else {
                SessionStatus::Completed
            };
            session.status = status;
            session.updated_at = Utc::now();
            status
        };

        let snapshot = entry.session.lock().unwrap().clone();
        self.persist(&snapshot);

        TraceEvent::SessionFinalized {
            session_id: session_id.to_owned(),
            status: format!("{status:?}"),
            steps: snapshot.steps.len(),
        }
        .emit();

        match status {
            SessionStatus::Completed => self.arm_idle_timer(session_id),
            _ => self.evict(session_id, "finalized").await,
        }
    }

    fn arm_idle_timer(self: &Arc<Self>, session_id: &str) {
        let registry = Arc::clone(self);
        let id = session_id.to_owned();
        let dur = std::time::Duration::from_secs(self.config.idle_timeout_secs);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(dur).await;
            registry.evict_if_still_idle(&id).await;
        });

        if let Some(entry) = self.active.lock().unwrap().get(session_id) {
            *entry.idle_timer.lock().unwrap() = Some(handle);
        }
    }

    async fn evict_if_still_idle(self: &Arc<Self>, session_id: &str) {
        let still_idle = match self.active.lock().unwrap().get(session_id) {
            Some(entry) => entry.session.lock().unwrap().status == SessionStatus::Completed,
            None => false,
        };
        if still_idle {
            self.evict(session_id, "idle timeout").await;
        }
    }

    async fn evict(self: &Arc<Self>, session_id: &str, reason: &str) {
        let entry = match self.active.lock().unwrap().remove(session_id) {
            Some(entry) => entry,
            None => return,
        };

        if let Some(handle) = entry.idle_timer.lock().unwrap().take() {
            handle.abort();
        }

        let snapshot = entry.session.lock().unwrap().clone();
        self.persist(&snapshot);
        self.recent.lock().unwrap().insert(snapshot);

        TraceEvent::SessionEvicted {
            session_id: session_id.to_owned(),
            reason: reason.to_owned(),
        }
        .emit();
    }

    /// Persist a snapshot of every currently active session. Run on a
    /// timer from the gateway's maintenance loop so a crash between two
    /// terminal events loses at most one flush interval of progress,
    /// rather than everything since the session's last state transition.
    pub fn flush_active(&self) {
        let snapshots: Vec<Session> = self
            .active
            .lock()
            .unwrap()
            .values()
            .map(|entry| entry.session.lock().unwrap().clone())
            .collect();

        for snapshot in &snapshots {
            self.persist(snapshot);
        }
    }

    /// Durable-store failures are observability-only; they never propagate.
    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.put(session) {
            tracing::warn!(session_id = %session.id, error = %e, "failed to persist session");
        }
    }
}

fn apply_event(session: &Mutex<Session>, turn: u32, event: &SSEEvent) {
    let mut session = session.lock().unwrap();
    session.updated_at = Utc::now();
    match event {
        SSEEvent::ThreadCreated { thread_id, .. } => {
            if session.thread_id.is_none() {
                session.thread_id = Some(thread_id.clone());
            }
        }
        SSEEvent::StepComplete {
            step,
            agent,
            duration,
            query,
            response,
            error,
            ..
        } => {
            session.steps.push(inv_domain::model::Step {
                index: *step,
                turn,
                agent: agent.clone(),
                duration: duration.clone(),
                query: query.clone(),
                response: response.clone(),
                error: *error,
            });
        }
        SSEEvent::Message { text, .. } => {
            session.diagnosis = Some(text.clone());
        }
        SSEEvent::RunComplete { steps, tokens, .. } => {
            session.run_meta.total_steps += steps;
            session.run_meta.total_tokens += tokens;
        }
        SSEEvent::Error { message, .. } => {
            session.error_detail = Some(message.clone());
        }
        SSEEvent::RunStart { .. } | SSEEvent::StepThinking { .. } | SSEEvent::StepStart { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inv_domain::config::OrchestratorConfig;
    use inv_orchestrator::{RawCallback, RemoteAgentRuntime, ToolCallKind, ToolCallResult};
    use inv_provisioner::AgentRecord;
    use std::time::Duration;
    use tokio::sync::mpsc;

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
            let thread_id = thread_id.unwrap_or_else(|| "thread-1".into());
            emit.send(RawCallback::ThreadRunInProgress { thread_id }).await.ok();
            emit.send(RawCallback::RunStepInProgress).await.ok();
            emit.send(RawCallback::RunStepCompleted {
                tool_calls: vec![ToolCallResult {
                    kind: ToolCallKind::ConnectedAgent,
                    agent: "agent-1".into(),
                    query: "find root cause".into(),
                    response: "found it".into(),
                    duration_ms: 120,
                    error: false,
                }],
            })
            .await
            .ok();
            emit.send(RawCallback::MessageDelta {
                text: "diagnosis text".into(),
            })
            .await
            .ok();
            emit.send(RawCallback::ThreadRunCompleted { total_tokens: 42 })
                .await
                .ok();
            Ok(())
        }
    }

    fn fleet() -> Arc<FleetRecord> {
        Arc::new(FleetRecord {
            orchestrator: AgentRecord {
                id: "agent-orch".into(),
                name: "Orchestrator".into(),
                model: "gpt-4o".into(),
                is_orchestrator: true,
                tools: vec![],
                connected_agents: vec!["Specialist".into()],
            },
            sub_agents: HashMap::from([(
                "Specialist".into(),
                AgentRecord {
                    id: "agent-1".into(),
                    name: "Specialist".into(),
                    model: "gpt-4o".into(),
                    is_orchestrator: false,
                    tools: vec![],
                    connected_agents: vec![],
                },
            )]),
        })
    }

    fn registry_with(config: SessionsConfig) -> Arc<SessionRegistry> {
        let orchestrator_config = OrchestratorConfig {
            stall_watchdog_secs: 5,
            ..Default::default()
        };
        let runtime = Arc::new(OrchestratorRuntime::new(orchestrator_config, Arc::new(HappyPathRuntime)));
        let mut fleets = HashMap::new();
        fleets.insert("telco".to_string(), fleet());
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(crate::store::JsonFileSessionStore::new(dir.path()).unwrap());
        SessionRegistry::new(config, runtime, fleets, store)
    }

    async fn wait_until_finalized(registry: &Arc<SessionRegistry>, id: &str) -> Session {
        for _ in 0..200 {
            if let Some(session) = registry.get(id) {
                if session.status != SessionStatus::InProgress && session.status != SessionStatus::Pending {
                    return session;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {id} never finalized");
    }

    #[tokio::test]
    async fn create_then_start_completes_and_records_diagnosis() {
        let registry = registry_with(SessionsConfig {
            idle_timeout_secs: 60,
            ..Default::default()
        });
        let session = registry.create("telco", "high latency alert").unwrap();
        registry.start(&session.id).unwrap();

        let finalized = wait_until_finalized(&registry, &session.id).await;
        assert_eq!(finalized.status, SessionStatus::Completed);
        assert_eq!(finalized.diagnosis.as_deref(), Some("diagnosis text"));
        assert_eq!(finalized.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(finalized.steps.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_unknown_scenario() {
        let registry = registry_with(SessionsConfig::default());
        let err = registry.create("unknown-scenario", "alert").unwrap_err();
        assert!(matches!(err, Error::ScenarioUnknown(_)));
    }

    #[tokio::test]
    async fn create_rejects_once_capacity_is_reached() {
        let registry = registry_with(SessionsConfig {
            max_active: 1,
            ..Default::default()
        });
        registry.create("telco", "first").unwrap();
        let err = registry.create("telco", "second").unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { max: 1 }));
    }

    #[tokio::test]
    async fn flush_active_persists_every_active_session() {
        let registry = registry_with(SessionsConfig {
            idle_timeout_secs: 60,
            ..Default::default()
        });
        let session = registry.create("telco", "high latency alert").unwrap();

        registry.flush_active();

        let persisted = registry
            .store
            .get("telco", &session.id)
            .unwrap()
            .expect("active session should have been flushed to the store");
        assert_eq!(persisted.id, session.id);
    }

    #[tokio::test]
    async fn continue_against_non_completed_session_is_rejected() {
        let registry = registry_with(SessionsConfig::default());
        let session = registry.create("telco", "alert").unwrap();
        let err = registry.continue_session(&session.id, "anything").unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn continue_after_completion_reuses_thread_and_increments_turn() {
        let registry = registry_with(SessionsConfig {
            idle_timeout_secs: 60,
            ..Default::default()
        });
        let session = registry.create("telco", "alert").unwrap();
        registry.start(&session.id).unwrap();
        let first = wait_until_finalized(&registry, &session.id).await;
        assert_eq!(first.status, SessionStatus::Completed);

        registry.continue_session(&session.id, "anything else?").unwrap();
        let second = wait_until_finalized(&registry, &session.id).await;
        assert_eq!(second.turn_count, 1);
        assert_eq!(second.thread_id.as_deref(), Some("thread-1"));
    }

    #[tokio::test]
    async fn list_merges_active_and_recent() {
        let registry = registry_with(SessionsConfig {
            idle_timeout_secs: 60,
            ..Default::default()
        });
        let a = registry.create("telco", "alert a").unwrap();
        registry.start(&a.id).unwrap();
        wait_until_finalized(&registry, &a.id).await;

        let b = registry.create("telco", "alert b").unwrap();
        let summaries = registry.list(Some("telco"));
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().any(|s| s.id == a.id));
        assert!(summaries.iter().any(|s| s.id == b.id));
    }
}
