//! Durable session persistence.
//!
//! The durable document store is modeled behind [`SessionStore`] so the
//! registry never knows whether it is writing to a local JSON file or a
//! remote document database. Every finalized session is written as a single
//! document keyed by session id, partitioned by scenario.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use inv_domain::{Error, Result};
use inv_domain::model::{Session, SessionSummary};

/// A scenario-partitioned durable store for finalized sessions.
pub trait SessionStore: Send + Sync {
    /// Upsert a session snapshot into its scenario partition.
    fn put(&self, session: &Session) -> Result<()>;

    /// Look up a session by scenario and id.
    fn get(&self, scenario: &str, id: &str) -> Result<Option<Session>>;

    /// List summaries across partitions, newest-first, optionally filtered
    /// by scenario and capped at `limit`.
    fn list_summaries(&self, scenario: Option<&str>, limit: usize) -> Result<Vec<SessionSummary>>;
}

/// JSON-file-backed store for local/offline operation: one file per
/// scenario under `<state_dir>/sessions/<scenario>.json`, matching the
/// teacher's file-per-partition session store.
pub struct JsonFileSessionStore {
    dir: PathBuf,
    partitions: RwLock<HashMap<String, HashMap<String, Session>>>,
}

impl JsonFileSessionStore {
    pub fn new(state_dir: &Path) -> Result<Self> {
        let dir = state_dir.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self {
            dir,
            partitions: RwLock::new(HashMap::new()),
        })
    }

    fn partition_path(&self, scenario: &str) -> PathBuf {
        self.dir.join(format!("{scenario}.json"))
    }

    fn load_partition(&self, scenario: &str) -> Result<HashMap<String, Session>> {
        let path = self.partition_path(scenario);
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn flush_partition(&self, scenario: &str, map: &HashMap<String, Session>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(self.partition_path(scenario), json).map_err(Error::Io)
    }
}

impl SessionStore for JsonFileSessionStore {
    fn put(&self, session: &Session) -> Result<()> {
        let mut partitions = self.partitions.write().unwrap();
        let map = match partitions.get_mut(&session.scenario) {
            Some(map) => map,
            None => {
                let loaded = self.load_partition(&session.scenario)?;
                partitions.entry(session.scenario.clone()).or_insert(loaded)
            }
        };
        map.insert(session.id.clone(), session.clone());
        self.flush_partition(&session.scenario, map)
    }

    fn get(&self, scenario: &str, id: &str) -> Result<Option<Session>> {
        let mut partitions = self.partitions.write().unwrap();
        let map = match partitions.get(scenario) {
            Some(map) => map.clone(),
            None => {
                let loaded = self.load_partition(scenario)?;
                partitions.insert(scenario.to_owned(), loaded.clone());
                loaded
            }
        };
        Ok(map.get(id).cloned())
    }

    fn list_summaries(&self, scenario: Option<&str>, limit: usize) -> Result<Vec<SessionSummary>> {
        let scenarios: Vec<String> = match scenario {
            Some(s) => vec![s.to_owned()],
            None => {
                let mut names = Vec::new();
                if let Ok(entries) = std::fs::read_dir(&self.dir) {
                    for entry in entries.flatten() {
                        if let Some(stem) = entry.path().file_stem() {
                            names.push(stem.to_string_lossy().into_owned());
                        }
                    }
                }
                names
            }
        };

        let mut summaries = Vec::new();
        for s in scenarios {
            let map = self.get_or_load(&s)?;
            summaries.extend(map.values().map(Session::summary));
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }
}

impl JsonFileSessionStore {
    fn get_or_load(&self, scenario: &str) -> Result<HashMap<String, Session>> {
        let mut partitions = self.partitions.write().unwrap();
        if let Some(map) = partitions.get(scenario) {
            return Ok(map.clone());
        }
        let loaded = self.load_partition(scenario)?;
        partitions.insert(scenario.to_owned(), loaded.clone());
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path()).unwrap();
        let session = Session::new("s1".into(), "telco".into(), "alert".into(), Utc::now());
        store.put(&session).unwrap();

        let loaded = store.get("telco", "s1").unwrap().unwrap();
        assert_eq!(loaded.id, "s1");
    }

    #[test]
    fn get_missing_partition_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path()).unwrap();
        assert!(store.get("unknown", "s1").unwrap().is_none());
    }

    #[test]
    fn list_summaries_spans_partitions_and_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path()).unwrap();
        store
            .put(&Session::new("s1".into(), "telco".into(), "a".into(), Utc::now()))
            .unwrap();
        store
            .put(&Session::new("s2".into(), "ecommerce".into(), "b".into(), Utc::now()))
            .unwrap();

        let all = store.list_summaries(None, 10).unwrap();
        assert_eq!(all.len(), 2);

        let scoped = store.list_summaries(Some("telco"), 10).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "s1");

        let limited = store.list_summaries(None, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn reopening_store_reloads_persisted_partition() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileSessionStore::new(dir.path()).unwrap();
            store
                .put(&Session::new("s1".into(), "telco".into(), "a".into(), Utc::now()))
                .unwrap();
        }
        let reopened = JsonFileSessionStore::new(dir.path()).unwrap();
        assert!(reopened.get("telco", "s1").unwrap().is_some());
    }
}
