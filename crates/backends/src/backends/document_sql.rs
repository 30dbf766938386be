//! Cosmos DB document-SQL telemetry backend — HTTPS SQL-over-REST.

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
struct DocumentSqlResponse {
    #[serde(default)]
    documents: Vec<serde_json::Map<String, serde_json::Value>>,
}

pub struct DocumentSqlBackend {
    client: reqwest::Client,
    endpoint: String,
    primary_key: String,
}

impl DocumentSqlBackend {
    pub fn new(endpoint: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            primary_key: primary_key.into(),
        }
    }
}

#[async_trait]
impl TelemetryBackend for DocumentSqlBackend {
    async fn execute_query(&self, query: &str, _params: QueryParams) -> Result<QueryResult> {
        let mut attempt = 0u32;
        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .header("x-ms-documentdb-isquery", "true")
                .header("authorization", &self.primary_key)
                .json(&json!({ "query": query }))
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
                return Err(Error::Unauthorized("document-sql primary key rejected".into()));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::InvalidQuery(truncate_with_ellipsis(&body, 500)));
            }

            let parsed: DocumentSqlResponse =
                response.json().await.map_err(|e| Error::Http(e.to_string()))?;
            let mut column_names: Vec<String> = Vec::new();
            for doc in &parsed.documents {
                for key in doc.keys() {
                    if !column_names.contains(key) {
                        column_names.push(key.clone());
                    }
                }
            }
            let columns = column_names
                .iter()
                .map(|name| Column {
                    name: name.clone(),
                    type_name: "dynamic".into(),
                })
                .collect();
            let data = parsed
                .documents
                .into_iter()
                .map(|doc| doc.into_iter().collect())
                .collect();
            return Ok(QueryResult { columns, data });
        }
    }

    async fn ping(&self) -> Result<()> {
        self.execute_query("SELECT TOP 1 * FROM c", QueryParams::default())
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn connector_id(&self) -> &'static str {
        "cosmos-sql"
    }
}
