//! TTL-cached lookup from logical resource names to physical ids.
//!
//! Grounded on the source's `fabric_discovery.py`: a `_discovery_in_progress`
//! flag guarded by a lock prevents concurrent refreshes from stampeding the
//! control-plane API; callers that arrive mid-refresh get the stale cache
//! instead of blocking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use inv_domain::model::{DiscoverySource, FabricDiscovery};
use inv_domain::Result;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct WorkspaceItem {
    pub id: String,
    pub display_name: String,
    pub item_type: String,
}

#[derive(Debug, Clone)]
pub struct KqlDatabaseDetail {
    pub query_service_uri: String,
    pub database_name: String,
}

/// Control-plane client abstraction, so tests can supply a fake without a
/// network dependency.
#[async_trait]
pub trait WorkspaceItemsClient: Send + Sync {
    async fn list_items(&self, workspace_id: &str) -> Result<Vec<WorkspaceItem>>;
    async fn kql_database_detail(
        &self,
        workspace_id: &str,
        item_id: &str,
    ) -> Result<KqlDatabaseDetail>;
}

/// The four env-var-settable ids, checked for full/partial precedence.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub workspace_id: Option<String>,
    pub graph_model_id: Option<String>,
    pub eventhouse_query_uri: Option<String>,
    pub kql_database_name: Option<String>,
}

impl EnvOverrides {
    fn all_present(&self) -> bool {
        self.workspace_id.is_some()
            && self.graph_model_id.is_some()
            && self.eventhouse_query_uri.is_some()
            && self.kql_database_name.is_some()
    }

    fn any_present(&self) -> bool {
        self.workspace_id.is_some()
            || self.graph_model_id.is_some()
            || self.eventhouse_query_uri.is_some()
            || self.kql_database_name.is_some()
    }
}

struct Cached {
    value: FabricDiscovery,
    fetched_at: Instant,
}

pub struct DiscoveryCache {
    client: Box<dyn WorkspaceItemsClient>,
    ttl: Duration,
    graph_model_prefix: String,
    eventhouse_prefix: String,
    env: EnvOverrides,
    cache: Mutex<Option<Cached>>,
    in_flight: AtomicBool,
}

impl DiscoveryCache {
    pub fn new(
        client: Box<dyn WorkspaceItemsClient>,
        ttl: Duration,
        graph_model_prefix: impl Into<String>,
        eventhouse_prefix: impl Into<String>,
        env: EnvOverrides,
    ) -> Self {
        Self {
            client,
            ttl,
            graph_model_prefix: graph_model_prefix.into(),
            eventhouse_prefix: eventhouse_prefix.into(),
            env,
            cache: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Drop the cache; the next call refreshes.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    pub async fn get(&self) -> Result<FabricDiscovery> {
        if self.env.all_present() {
            return Ok(FabricDiscovery {
                workspace_id: self.env.workspace_id.clone().unwrap(),
                graph_model_id: self.env.graph_model_id.clone(),
                eventhouse_query_uri: self.env.eventhouse_query_uri.clone(),
                kql_database_name: self.env.kql_database_name.clone(),
                source: DiscoverySource::Env,
                refreshed_at: chrono::Utc::now(),
            });
        }

        let Some(workspace_id) = self.env.workspace_id.clone() else {
            return Ok(FabricDiscovery {
                workspace_id: String::new(),
                graph_model_id: None,
                eventhouse_query_uri: None,
                kql_database_name: None,
                source: DiscoverySource::NotConfigured,
                refreshed_at: chrono::Utc::now(),
            });
        };

        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                let fresh = cached.fetched_at.elapsed() < self.ttl;
                if fresh || self.in_flight.load(Ordering::Acquire) {
                    return Ok(cached.value.clone());
                }
            }
        }

        self.refresh(&workspace_id).await
    }

    async fn refresh(&self, workspace_id: &str) -> Result<FabricDiscovery> {
        self.in_flight.store(true, Ordering::Release);
        let result = self.discover(workspace_id).await;
        self.in_flight.store(false, Ordering::Release);

        let discovered = match result {
            Ok(mut value) => {
                if self.env.any_present() {
                    self.apply_env_overrides(&mut value);
                }
                value
            }
            Err(_) => FabricDiscovery {
                workspace_id: workspace_id.to_owned(),
                graph_model_id: None,
                eventhouse_query_uri: None,
                kql_database_name: None,
                source: DiscoverySource::DiscoveryFailed,
                refreshed_at: chrono::Utc::now(),
            },
        };

        *self.cache.lock().await = Some(Cached {
            value: discovered.clone(),
            fetched_at: Instant::now(),
        });
        Ok(discovered)
    }

    fn apply_env_overrides(&self, value: &mut FabricDiscovery) {
        if let Some(g) = &self.env.graph_model_id {
            value.graph_model_id = Some(g.clone());
        }
        if let Some(u) = &self.env.eventhouse_query_uri {
            value.eventhouse_query_uri = Some(u.clone());
        }
        if let Some(d) = &self.env.kql_database_name {
            value.kql_database_name = Some(d.clone());
        }
        value.source = DiscoverySource::Partial;
    }

    async fn discover(&self, workspace_id: &str) -> Result<FabricDiscovery> {
        let items = self.client.list_items(workspace_id).await?;

        let graph_model_id = pick_candidate(&items, "GraphModel", &self.graph_model_prefix);
        let eventhouse_item = pick_item(&items, "KQLDatabase", &self.eventhouse_prefix);

        let (eventhouse_query_uri, kql_database_name) = if let Some(item) = &eventhouse_item {
            match self.client.kql_database_detail(workspace_id, &item.id).await {
                Ok(detail) => (Some(detail.query_service_uri), Some(detail.database_name)),
                Err(_) => (None, None),
            }
        } else {
            (None, None)
        };

        Ok(FabricDiscovery {
            workspace_id: workspace_id.to_owned(),
            graph_model_id,
            eventhouse_query_uri,
            kql_database_name,
            source: DiscoverySource::Discovery,
            refreshed_at: chrono::Utc::now(),
        })
    }
}

fn pick_item<'a>(items: &'a [WorkspaceItem], item_type: &str, prefix: &str) -> Option<&'a WorkspaceItem> {
    let candidates: Vec<&WorkspaceItem> =
        items.iter().filter(|i| i.item_type == item_type).collect();

    if let Some(matched) = candidates
        .iter()
        .find(|i| i.display_name.to_lowercase().contains(&prefix.to_lowercase()))
    {
        return Some(matched);
    }
    // Fall back to the sole candidate if no convention match exists.
    if candidates.len() == 1 {
        return Some(candidates[0]);
    }
    None
}

fn pick_candidate(items: &[WorkspaceItem], item_type: &str, prefix: &str) -> Option<String> {
    pick_item(items, item_type, prefix).map(|i| i.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct FakeClient {
        items: Vec<WorkspaceItem>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WorkspaceItemsClient for FakeClient {
        async fn list_items(&self, _workspace_id: &str) -> Result<Vec<WorkspaceItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
        async fn kql_database_detail(
            &self,
            _workspace_id: &str,
            _item_id: &str,
        ) -> Result<KqlDatabaseDetail> {
            Ok(KqlDatabaseDetail {
                query_service_uri: "https://eh.example/query".into(),
                database_name: "incidentdb".into(),
            })
        }
    }

    fn items() -> Vec<WorkspaceItem> {
        vec![
            WorkspaceItem {
                id: "gm-1".into(),
                display_name: "incident-ontology-graph".into(),
                item_type: "GraphModel".into(),
            },
            WorkspaceItem {
                id: "eh-1".into(),
                display_name: "incident-eventhouse".into(),
                item_type: "KQLDatabase".into(),
            },
        ]
    }

    #[tokio::test]
    async fn env_vars_skip_discovery_entirely() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DiscoveryCache::new(
            Box::new(FakeClient {
                items: vec![],
                calls: calls.clone(),
            }),
            Duration::from_secs(600),
            "incident",
            "incident",
            EnvOverrides {
                workspace_id: Some("ws".into()),
                graph_model_id: Some("gm".into()),
                eventhouse_query_uri: Some("uri".into()),
                kql_database_name: Some("db".into()),
            },
        );

        let result = cache.get().await.unwrap();
        assert_eq!(result.source, DiscoverySource::Env);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn discovers_by_convention_prefix() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DiscoveryCache::new(
            Box::new(FakeClient {
                items: items(),
                calls: calls.clone(),
            }),
            Duration::from_secs(600),
            "incident",
            "incident",
            EnvOverrides {
                workspace_id: Some("ws-1".into()),
                ..Default::default()
            },
        );

        let result = cache.get().await.unwrap();
        assert_eq!(result.source, DiscoverySource::Discovery);
        assert_eq!(result.graph_model_id, Some("gm-1".into()));
        assert_eq!(result.eventhouse_query_uri, Some("https://eh.example/query".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn caches_within_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DiscoveryCache::new(
            Box::new(FakeClient {
                items: items(),
                calls: calls.clone(),
            }),
            Duration::from_secs(600),
            "incident",
            "incident",
            EnvOverrides {
                workspace_id: Some("ws-1".into()),
                ..Default::default()
            },
        );

        cache.get().await.unwrap();
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DiscoveryCache::new(
            Box::new(FakeClient {
                items: items(),
                calls: calls.clone(),
            }),
            Duration::from_secs(600),
            "incident",
            "incident",
            EnvOverrides {
                workspace_id: Some("ws-1".into()),
                ..Default::default()
            },
        );

        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn falls_back_to_sole_candidate_without_prefix_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mismatched_items = vec![WorkspaceItem {
            id: "gm-unrelated".into(),
            display_name: "totally-different-name".into(),
            item_type: "GraphModel".into(),
        }];
        let cache = DiscoveryCache::new(
            Box::new(FakeClient {
                items: mismatched_items,
                calls: calls.clone(),
            }),
            Duration::from_secs(600),
            "incident",
            "incident",
            EnvOverrides {
                workspace_id: Some("ws-1".into()),
                ..Default::default()
            },
        );

        let result = cache.get().await.unwrap();
        assert_eq!(result.graph_model_id, Some("gm-unrelated".into()));
    }
}
