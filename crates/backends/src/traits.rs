use async_trait::async_trait;
use inv_domain::Result;

use crate::model::{Edge, IngestSummary, QueryParams, QueryResult, TopologyResult, Vertex};

/// Capability set shared by every graph backend. `GetTopology` and
/// `Ingest` are separate traits (below) composed in only where the
/// backend actually supports them — this replaces the source's
/// `isinstance` branching with explicit trait objects a caller can
/// downcast to via `as_topology()`/`as_ingest()`.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn execute_query(&self, query: &str, params: QueryParams) -> Result<QueryResult>;
    async fn ping(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;

    fn connector_id(&self) -> &'static str;

    /// Downcast to the topology capability, if this backend supports it.
    fn as_topology(&self) -> Option<&dyn SupportsTopology> {
        None
    }
    /// Downcast to the ingest capability, if this backend supports it.
    fn as_ingest(&self) -> Option<&dyn SupportsIngest> {
        None
    }
}

#[async_trait]
pub trait SupportsTopology: Send + Sync {
    async fn get_topology(&self, params: QueryParams) -> Result<TopologyResult>;
}

#[async_trait]
pub trait SupportsIngest: Send + Sync {
    async fn ingest(&self, vertices: Vec<Vertex>, edges: Vec<Edge>) -> Result<IngestSummary>;
}

#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    async fn execute_query(&self, query: &str, params: QueryParams) -> Result<QueryResult>;
    async fn ping(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;

    fn connector_id(&self) -> &'static str;
}
