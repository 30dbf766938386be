//! Fabric KQL telemetry backend — a Kusto-style client against a cluster
//! URI with a database context. Retries transient failures (429/5xx) with
//! jittered backoff; unlike the graph-side ladder this one is a single
//! uniform class since the source gives no telemetry-specific retry detail.

use std::time::Duration;

use async_trait::async_trait;
use inv_domain::sse::truncate_with_ellipsis;
use inv_domain::{Error, Result};
use serde::Deserialize;
use serde_json::json;

use crate::model::{Column, QueryParams, QueryResult};
use crate::retry::jitter;
use crate::traits::TelemetryBackend;

const MAX_ATTEMPTS: u32 = 4;

#[derive(Deserialize)]
struct KustoResponse {
    #[serde(default)]
    columns: Vec<KustoColumn>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct KustoColumn {
    #[serde(rename = "ColumnName")]
    name: String,
    #[serde(rename = "ColumnType")]
    type_name: String,
}

pub struct FabricKqlBackend {
    client: reqwest::Client,
    query_uri: String,
    database: String,
    token: Box<dyn Fn() -> Result<String> + Send + Sync>,
}

impl FabricKqlBackend {
    pub fn new(
        query_uri: impl Into<String>,
        database: impl Into<String>,
        token: Box<dyn Fn() -> Result<String> + Send + Sync>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            query_uri: query_uri.into(),
            database: database.into(),
            token,
        }
    }
}

#[async_trait]
impl TelemetryBackend for FabricKqlBackend {
    async fn execute_query(&self, query: &str, _params: QueryParams) -> Result<QueryResult> {
        let mut attempt = 0u32;
        loop {
            let bearer = (self.token)()?;
            let response = self
                .client
                .post(&self.query_uri)
                .bearer_auth(bearer)
                .json(&json!({ "db": self.database, "csl": query }))
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::PermanentServiceFailure(truncate_with_ellipsis(
                        &body, 500,
                    )));
                }
                tokio::time::sleep(jitter(Duration::from_secs(2u64.pow(attempt)))).await;
                continue;
            }
            if status.as_u16() == 401 {
                return Err(Error::Unauthorized("kusto token rejected".into()));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::InvalidQuery(truncate_with_ellipsis(&body, 500)));
            }

            let parsed: KustoResponse = response.json().await.map_err(|e| Error::Http(e.to_string()))?;
            let columns: Vec<Column> = parsed
                .columns
                .into_iter()
                .map(|c| Column {
                    name: c.name,
                    type_name: c.type_name,
                })
                .collect();
            let data = parsed
                .rows
                .into_iter()
                .map(|row| {
                    columns
                        .iter()
                        .zip(row.into_iter())
                        .map(|(c, v)| (c.name.clone(), v))
                        .collect()
                })
                .collect();
            return Ok(QueryResult { columns, data });
        }
    }

    async fn ping(&self) -> Result<()> {
        self.execute_query("print 1", QueryParams::default())
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn connector_id(&self) -> &'static str {
        "fabric-kql"
    }
}
