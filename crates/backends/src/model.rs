use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named query parameters. Workspace/graph/db coordinates may be passed
/// explicitly here or left absent and defaulted from DiscoveryCache.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub continuation_token: Option<String>,
    pub workspace_id: Option<String>,
    pub graph_name: Option<String>,
    pub database_name: Option<String>,
}

/// Normalized tabular result shape, regardless of backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub data: Vec<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl QueryResult {
    /// Every row's keys are a subset of the declared column names.
    pub fn is_well_formed(&self) -> bool {
        let names: std::collections::HashSet<&str> =
            self.columns.iter().map(|c| c.name.as_str()).collect();
        self.data
            .iter()
            .all(|row| row.keys().all(|k| names.contains(k.as_str())))
    }
}

/// Node/edge topology view assembled by `GetTopology` from a per-relationship
/// schema table rather than a single wide join.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopologyResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: String,
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub label: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

/// One relationship kind in the static topology schema table — a row
/// describes how to pull one edge type without a wide multi-way join.
#[derive(Debug, Clone)]
pub struct RelationshipSchema {
    pub relationship: &'static str,
    pub source_label: &'static str,
    pub target_label: &'static str,
    pub source_id_property: &'static str,
    pub target_id_property: &'static str,
}

/// Vertex to upsert via `Ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub label: String,
    pub id: String,
    pub partition_key: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

/// Edge endpoint reference used by `Ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEndpoint {
    pub label: String,
    pub id_property: String,
    pub id_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub label: String,
    pub source: EdgeEndpoint,
    pub target: EdgeEndpoint,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub vertices_upserted: usize,
    pub edges_upserted: usize,
}
