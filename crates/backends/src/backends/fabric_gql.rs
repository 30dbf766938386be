//! Fabric GQL graph backend — HTTPS POST to a GraphModel `executeQuery`
//! endpoint, with a three-class retry ladder (rate-limit, cold-start,
//! continuation).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use inv_domain::sse::truncate_with_ellipsis;
use inv_domain::{Error, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;

use crate::model::{Column, QueryParams, QueryResult, RelationshipSchema, TopologyResult};
use crate::retry::{cold_start_backoff, continuation_delay, jitter, parse_retry_after};
use crate::traits::{GraphBackend, SupportsTopology};

const RATE_LIMIT_CAP: u32 = 2;
const COLD_START_CAP: u32 = 5;
const CONTINUATION_CAP: u32 = 5;

/// Static schema table describing how to pull each relationship kind
/// without a single wide multi-way join.
const TOPOLOGY_SCHEMA: &[RelationshipSchema] = &[
    RelationshipSchema {
        relationship: "CONNECTS_TO",
        source_label: "Device",
        target_label: "Device",
        source_id_property: "deviceId",
        target_id_property: "deviceId",
    },
    RelationshipSchema {
        relationship: "HOSTS",
        source_label: "Device",
        target_label: "Service",
        source_id_property: "deviceId",
        target_id_property: "serviceId",
    },
    RelationshipSchema {
        relationship: "DEPENDS_ON",
        source_label: "Service",
        target_label: "Service",
        source_id_property: "serviceId",
        target_id_property: "serviceId",
    },
];

#[derive(Deserialize)]
struct ExecuteQueryResponse {
    status: ResponseStatus,
    #[serde(default)]
    result: Option<ResponseResult>,
}

#[derive(Deserialize)]
struct ResponseStatus {
    code: String,
}

#[derive(Deserialize)]
struct ResponseResult {
    #[serde(default)]
    columns: Vec<ResultColumn>,
    #[serde(default)]
    data: Vec<std::collections::HashMap<String, serde_json::Value>>,
    #[serde(default, rename = "nextPage")]
    next_page: Option<String>,
}

#[derive(Deserialize)]
struct ResultColumn {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

struct TokenState {
    token: String,
    acquired_at: Instant,
}

pub struct FabricGqlBackend {
    client: reqwest::Client,
    query_endpoint: String,
    token: Mutex<Option<TokenState>>,
    token_staleness: Duration,
    credential: Box<dyn Fn() -> Result<String> + Send + Sync>,
    on_429: Box<dyn Fn() + Send + Sync>,
    on_server_error: Box<dyn Fn() + Send + Sync>,
    requests_issued: AtomicU64,
}

impl FabricGqlBackend {
    pub fn new(
        query_endpoint: impl Into<String>,
        token_staleness: Duration,
        credential: Box<dyn Fn() -> Result<String> + Send + Sync>,
        on_429: Box<dyn Fn() + Send + Sync>,
        on_server_error: Box<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            query_endpoint: query_endpoint.into(),
            token: Mutex::new(None),
            token_staleness,
            credential,
            on_429,
            on_server_error,
            requests_issued: AtomicU64::new(0),
        }
    }

    fn current_token(&self) -> Result<String> {
        let mut guard = self.token.lock();
        let stale = guard
            .as_ref()
            .map(|t| t.acquired_at.elapsed() >= self.token_staleness)
            .unwrap_or(true);
        if stale {
            let token = (self.credential)()?;
            *guard = Some(TokenState {
                token: token.clone(),
                acquired_at: Instant::now(),
            });
            Ok(token)
        } else {
            Ok(guard.as_ref().unwrap().token.clone())
        }
    }

    async fn execute_query_inner(
        &self,
        query: &str,
        mut continuation_token: Option<String>,
    ) -> Result<QueryResult> {
        let mut rate_limit_attempts = 0u32;
        let mut cold_start_attempts = 0u32;
        let mut continuation_attempts = 0u32;
        let mut token = self.current_token()?;

        loop {
            self.requests_issued.fetch_add(1, Ordering::Relaxed);
            let body = json!({
                "query": query,
                "continuationToken": continuation_token,
                "beta": true,
            });

            let response = self
                .client
                .post(&self.query_endpoint)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            let status = response.status();

            if status.as_u16() == 429 {
                rate_limit_attempts += 1;
                if rate_limit_attempts > RATE_LIMIT_CAP {
                    return Err(Error::RateLimited {
                        retry_after_secs: 30.0,
                    });
                }
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_owned());
                (self.on_429)();
                let wait = jitter(parse_retry_after(retry_after.as_deref()));
                tokio::time::sleep(wait).await;
                token = self.current_token()?;
                continue;
            }

            if status.as_u16() == 500 {
                let body_text = response.text().await.unwrap_or_default();
                if body_text.contains("ColdStartTimeout") {
                    cold_start_attempts += 1;
                    if cold_start_attempts > COLD_START_CAP {
                        return Err(Error::ColdStart);
                    }
                    let wait = jitter(cold_start_backoff(cold_start_attempts));
                    tokio::time::sleep(wait).await;
                    continuation_token = None;
                    token = self.current_token()?;
                    continue;
                }
                (self.on_server_error)();
                return Err(Error::PermanentServiceFailure(truncate_with_ellipsis(
                    &body_text, 500,
                )));
            }

            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 401 {
                    return Err(Error::Unauthorized(truncate_with_ellipsis(&body_text, 500)));
                }
                return Err(Error::InvalidQuery(truncate_with_ellipsis(&body_text, 500)));
            }

            let parsed: ExecuteQueryResponse = response
                .json()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            if parsed.status.code == "02000" {
                if let Some(result) = &parsed.result {
                    if let Some(next_page) = &result.next_page {
                        continuation_attempts += 1;
                        if continuation_attempts > CONTINUATION_CAP {
                            return Err(Error::Continuation {
                                token: next_page.clone(),
                            });
                        }
                        tokio::time::sleep(continuation_delay()).await;
                        continuation_token = Some(next_page.clone());
                        continue;
                    }
                }
            }

            let result = parsed.result.unwrap_or(ResponseResult {
                columns: vec![],
                data: vec![],
                next_page: None,
            });
            return Ok(QueryResult {
                columns: result
                    .columns
                    .into_iter()
                    .map(|c| Column {
                        name: c.name,
                        type_name: c.type_name,
                    })
                    .collect(),
                data: result.data,
            });
        }
    }
}

#[async_trait]
impl GraphBackend for FabricGqlBackend {
    async fn execute_query(&self, query: &str, params: QueryParams) -> Result<QueryResult> {
        self.execute_query_inner(query, params.continuation_token)
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.execute_query_inner("MATCH (n) RETURN n LIMIT 1", None)
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn connector_id(&self) -> &'static str {
        "fabric-gql"
    }

    fn as_topology(&self) -> Option<&dyn SupportsTopology> {
        Some(self)
    }
}

#[async_trait]
impl SupportsTopology for FabricGqlBackend {
    async fn get_topology(&self, _params: QueryParams) -> Result<TopologyResult> {
        let mut result = TopologyResult::default();
        for schema in TOPOLOGY_SCHEMA {
            let query = format!(
                "MATCH (s:{})-[r:{}]->(t:{}) RETURN s, r, t",
                schema.source_label, schema.relationship, schema.target_label
            );
            let rows = self.execute_query_inner(&query, None).await?;
            for row in rows.data {
                if let (Some(source_id), Some(target_id)) = (
                    row.get(schema.source_id_property),
                    row.get(schema.target_id_property),
                ) {
                    result.edges.push(crate::model::GraphEdge {
                        label: schema.relationship.to_string(),
                        source_id: source_id.as_str().unwrap_or_default().to_string(),
                        target_id: target_id.as_str().unwrap_or_default().to_string(),
                        properties: row.clone(),
                    });
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_schema_has_no_duplicate_relationships() {
        let names: std::collections::HashSet<&str> =
            TOPOLOGY_SCHEMA.iter().map(|s| s.relationship).collect();
        assert_eq!(names.len(), TOPOLOGY_SCHEMA.len());
    }
}
