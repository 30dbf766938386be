//! Deterministic canned-response telemetry backend for offline demos and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use inv_domain::Result;
use serde_json::json;

use crate::model::{Column, QueryParams, QueryResult};
use crate::traits::TelemetryBackend;

pub struct MockTelemetryBackend {
    patterns: Vec<(&'static str, QueryResult)>,
}

impl Default for MockTelemetryBackend {
    fn default() -> Self {
        Self {
            patterns: vec![
                (
                    "ERROR",
                    QueryResult {
                        columns: vec![
                            Column {
                                name: "Timestamp".into(),
                                type_name: "datetime".into(),
                            },
                            Column {
                                name: "Level".into(),
                                type_name: "string".into(),
                            },
                            Column {
                                name: "Message".into(),
                                type_name: "string".into(),
                            },
                        ],
                        data: vec![HashMap::from([
                            ("Timestamp".to_string(), json!("2026-07-31T02:14:00Z")),
                            ("Level".to_string(), json!("Error")),
                            (
                                "Message".to_string(),
                                json!("interface GigabitEthernet0/1 flapping"),
                            ),
                        ])],
                    },
                ),
                (
                    "LATENCY",
                    QueryResult {
                        columns: vec![
                            Column {
                                name: "Timestamp".into(),
                                type_name: "datetime".into(),
                            },
                            Column {
                                name: "LatencyMs".into(),
                                type_name: "real".into(),
                            },
                        ],
                        data: vec![HashMap::from([
                            ("Timestamp".to_string(), json!("2026-07-31T02:15:00Z")),
                            ("LatencyMs".to_string(), json!(842.5)),
                        ])],
                    },
                ),
            ],
        }
    }
}

#[async_trait]
impl TelemetryBackend for MockTelemetryBackend {
    async fn execute_query(&self, query: &str, _params: QueryParams) -> Result<QueryResult> {
        let upper = query.to_uppercase();
        for (pattern, result) in &self.patterns {
            if upper.contains(pattern) {
                return Ok(result.clone());
            }
        }
        Ok(QueryResult {
            columns: vec![Column {
                name: "echo".into(),
                type_name: "string".into(),
            }],
            data: vec![HashMap::from([("echo".to_string(), json!(query))])],
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn connector_id(&self) -> &'static str {
        "mock-telemetry"
    }
}
