//! Deterministic canned-response graph backend for offline demos and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use inv_domain::Result;
use serde_json::json;

use crate::model::{Column, Edge, IngestSummary, QueryParams, QueryResult, Vertex};
use crate::traits::{GraphBackend, SupportsIngest};

pub struct MockGraphBackend {
    patterns: Vec<(&'static str, QueryResult)>,
}

impl Default for MockGraphBackend {
    fn default() -> Self {
        Self {
            patterns: vec![
                (
                    "LINK",
                    QueryResult {
                        columns: vec![
                            Column {
                                name: "device".into(),
                                type_name: "string".into(),
                            },
                            Column {
                                name: "status".into(),
                                type_name: "string".into(),
                            },
                        ],
                        data: vec![HashMap::from([
                            ("device".to_string(), json!("LINK-SYD-MEL-FIBRE-01")),
                            ("status".to_string(), json!("down")),
                        ])],
                    },
                ),
                (
                    "DEVICE",
                    QueryResult {
                        columns: vec![Column {
                            name: "deviceId".into(),
                            type_name: "string".into(),
                        }],
                        data: vec![HashMap::from([(
                            "deviceId".to_string(),
                            json!("SYD-CORE-RTR-01"),
                        )])],
                    },
                ),
            ],
        }
    }
}

#[async_trait]
impl GraphBackend for MockGraphBackend {
    async fn execute_query(&self, query: &str, _params: QueryParams) -> Result<QueryResult> {
        let upper = query.to_uppercase();
        for (pattern, result) in &self.patterns {
            if upper.contains(pattern) {
                return Ok(result.clone());
            }
        }
        // Best-effort echo.
        Ok(QueryResult {
            columns: vec![Column {
                name: "echo".into(),
                type_name: "string".into(),
            }],
            data: vec![HashMap::from([(
                "echo".to_string(),
                json!(query),
            )])],
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn connector_id(&self) -> &'static str {
        "mock-graph"
    }

    fn as_ingest(&self) -> Option<&dyn SupportsIngest> {
        Some(self)
    }
}

#[async_trait]
impl SupportsIngest for MockGraphBackend {
    async fn ingest(&self, _vertices: Vec<Vertex>, _edges: Vec<Edge>) -> Result<IngestSummary> {
        Err(inv_domain::Error::UnsupportedOperation(
            "mock-graph backend does not support ingest".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_link_pattern() {
        let backend = MockGraphBackend::default();
        let result = backend
            .execute_query("MATCH (l:Link) WHERE l.name = 'LINK-SYD-MEL-FIBRE-01' RETURN l", QueryParams::default())
            .await
            .unwrap();
        assert_eq!(result.data[0]["status"], json!("down"));
    }

    #[tokio::test]
    async fn falls_back_to_echo() {
        let backend = MockGraphBackend::default();
        let result = backend
            .execute_query("MATCH (x) RETURN x", QueryParams::default())
            .await
            .unwrap();
        assert_eq!(result.data[0]["echo"], json!("MATCH (x) RETURN x"));
    }

    #[tokio::test]
    async fn ingest_rejected() {
        let backend = MockGraphBackend::default();
        let err = backend.ingest(vec![], vec![]).await.unwrap_err();
        assert!(matches!(err, inv_domain::Error::UnsupportedOperation(_)));
    }
}
