//! Selects and caches concrete backend instances from a scenario's
//! connector bindings. One `BackendFactory` is shared across all sessions
//! of a scenario so repeated investigations reuse the same connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use inv_domain::model::{BackendBinding, DataSourceMap};
use inv_domain::{Error, Result};
use parking_lot::Mutex;

use crate::backends::document_sql::DocumentSqlBackend;
use crate::backends::fabric_gql::FabricGqlBackend;
use crate::backends::fabric_kql::FabricKqlBackend;
use crate::backends::gremlin::GremlinBackend;
use crate::backends::mock_graph::MockGraphBackend;
use crate::backends::mock_telemetry::MockTelemetryBackend;
use crate::throttle::ThrottleGate;
use crate::traits::{GraphBackend, TelemetryBackend};

/// Closure that produces a bearer credential on demand, shared by every
/// backend wired from the same factory.
pub type CredentialFn = Arc<dyn Fn() -> Result<String> + Send + Sync>;

#[derive(Clone)]
struct CacheKey {
    scenario: String,
    role: &'static str,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.scenario == other.scenario && self.role == other.role
    }
}
impl Eq for CacheKey {}
impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.scenario.hash(state);
        self.role.hash(state);
    }
}

pub struct BackendFactory {
    credential: CredentialFn,
    throttles: Mutex<HashMap<String, Arc<ThrottleGate>>>,
    graph_cache: Mutex<HashMap<CacheKey, Arc<dyn GraphBackend>>>,
    telemetry_cache: Mutex<HashMap<CacheKey, Arc<dyn TelemetryBackend>>>,
    default_throttle: inv_domain::config::ThrottleConfig,
}

impl BackendFactory {
    pub fn new(
        credential: CredentialFn,
        default_throttle: inv_domain::config::ThrottleConfig,
    ) -> Self {
        Self {
            credential,
            throttles: Mutex::new(HashMap::new()),
            graph_cache: Mutex::new(HashMap::new()),
            telemetry_cache: Mutex::new(HashMap::new()),
            default_throttle,
        }
    }

    /// Each connector gets its own throttle gate, shared across scenarios
    /// that bind to it — rate limits are a property of the remote service,
    /// not of any one investigation.
    pub fn throttle_for(&self, connector: &str) -> Arc<ThrottleGate> {
        let mut guard = self.throttles.lock();
        guard
            .entry(connector.to_string())
            .or_insert_with(|| {
                let resolved = self.default_throttle.resolve(connector);
                Arc::new(ThrottleGate::new(resolved))
            })
            .clone()
    }

    pub fn graph_backend(
        &self,
        scenario: &str,
        sources: &DataSourceMap,
    ) -> Result<Arc<dyn GraphBackend>> {
        let key = CacheKey {
            scenario: scenario.to_string(),
            role: "graph",
        };
        if let Some(existing) = self.graph_cache.lock().get(&key) {
            return Ok(existing.clone());
        }
        let backend = self.build_graph_backend(&sources.graph)?;
        self.graph_cache.lock().insert(key, backend.clone());
        Ok(backend)
    }

    pub fn telemetry_backend(
        &self,
        scenario: &str,
        sources: &DataSourceMap,
    ) -> Result<Arc<dyn TelemetryBackend>> {
        let key = CacheKey {
            scenario: scenario.to_string(),
            role: "telemetry",
        };
        if let Some(existing) = self.telemetry_cache.lock().get(&key) {
            return Ok(existing.clone());
        }
        let backend = self.build_telemetry_backend(&sources.telemetry)?;
        self.telemetry_cache.lock().insert(key, backend.clone());
        Ok(backend)
    }

    fn build_graph_backend(&self, binding: &BackendBinding) -> Result<Arc<dyn GraphBackend>> {
        match binding.connector.as_str() {
            "fabric-gql" => {
                let endpoint = binding
                    .config
                    .endpoint
                    .clone()
                    .ok_or_else(|| Error::Config("fabric-gql binding missing endpoint".into()))?;
                let credential = self.credential.clone();
                let throttle = self.throttle_for("fabric-gql");
                let throttle_429 = throttle.clone();
                let throttle_5xx = throttle;
                Ok(Arc::new(FabricGqlBackend::new(
                    endpoint,
                    Duration::from_secs(3000),
                    Box::new(move || credential()),
                    Box::new(move || throttle_429.record_429()),
                    Box::new(move || throttle_5xx.record_server_error()),
                )))
            }
            "cosmos-gremlin" => Err(Error::UnsupportedOperation(
                "cosmos-gremlin requires a live connection factory; construct GremlinBackend directly".into(),
            )),
            "mock-graph" => Ok(Arc::new(MockGraphBackend::default())),
            other => Err(Error::Config(format!("unknown graph connector: {other}"))),
        }
    }

    fn build_telemetry_backend(
        &self,
        binding: &BackendBinding,
    ) -> Result<Arc<dyn TelemetryBackend>> {
        match binding.connector.as_str() {
            "fabric-kql" => {
                let endpoint = binding
                    .config
                    .endpoint
                    .clone()
                    .ok_or_else(|| Error::Config("fabric-kql binding missing endpoint".into()))?;
                let database = binding
                    .config
                    .database_name
                    .clone()
                    .ok_or_else(|| Error::Config("fabric-kql binding missing database_name".into()))?;
                let credential = self.credential.clone();
                Ok(Arc::new(FabricKqlBackend::new(
                    endpoint,
                    database,
                    Box::new(move || credential()),
                )))
            }
            "cosmos-sql" => {
                let endpoint = binding
                    .config
                    .endpoint
                    .clone()
                    .ok_or_else(|| Error::Config("cosmos-sql binding missing endpoint".into()))?;
                let key = (self.credential)()?;
                Ok(Arc::new(DocumentSqlBackend::new(endpoint, key)))
            }
            "mock-telemetry" => Ok(Arc::new(MockTelemetryBackend::default())),
            other => Err(Error::Config(format!("unknown telemetry connector: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inv_domain::model::BackendConfig;

    fn sources(graph_connector: &str, telemetry_connector: &str) -> DataSourceMap {
        DataSourceMap {
            graph: BackendBinding {
                connector: graph_connector.to_string(),
                config: BackendConfig::default(),
            },
            telemetry: BackendBinding {
                connector: telemetry_connector.to_string(),
                config: BackendConfig::default(),
            },
            search_indexes: HashMap::new(),
        }
    }

    fn factory() -> BackendFactory {
        BackendFactory::new(
            Arc::new(|| Ok("token".to_string())),
            inv_domain::config::ThrottleConfig::default(),
        )
    }

    #[test]
    fn mock_graph_backend_is_cached_per_scenario() {
        let factory = factory();
        let sources = sources("mock-graph", "mock-telemetry");
        let first = factory.graph_backend("telco-outage", &sources).unwrap();
        let second = factory.graph_backend("telco-outage", &sources).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_connector_is_rejected() {
        let factory = factory();
        let sources = sources("no-such-connector", "mock-telemetry");
        match factory.graph_backend("telco-outage", &sources) {
            Err(err) => assert!(matches!(err, Error::Config(_))),
            Ok(_) => panic!("expected Error::Config"),
        }
    }

    #[test]
    fn throttle_gate_is_shared_per_connector() {
        let factory = factory();
        let a = factory.throttle_for("fabric-gql");
        let b = factory.throttle_for("fabric-gql");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
