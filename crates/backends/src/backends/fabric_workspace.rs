//! HTTP [`WorkspaceItemsClient`](crate::discovery::WorkspaceItemsClient) for
//! the Fabric workspace control-plane API.
//!
//! Grounded on the source's `fabric_discovery.py`: `GET
//! {api_base_url}/workspaces/{workspace_id}/items` lists items as
//! `{"value": [{"id", "type", "displayName"}, ...]}`; `GET
//! {api_base_url}/workspaces/{workspace_id}/kqlDatabases/{item_id}` returns
//! `{"properties": {"queryServiceUri", "databaseName"}}`. The
//! [`WorkspaceItemsClient`] trait only passes the item id into this call,
//! not its display name, so the fallback when `databaseName` is absent
//! uses the id rather than the source's display-name fallback.

use async_trait::async_trait;
use inv_domain::{Error, Result};
use serde::Deserialize;

use crate::discovery::{KqlDatabaseDetail, WorkspaceItem, WorkspaceItemsClient};
use crate::factory::CredentialFn;

#[derive(Debug, Deserialize)]
struct ListItemsResponse {
    #[serde(default)]
    value: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(rename = "displayName", default)]
    display_name: String,
}

#[derive(Debug, Deserialize, Default)]
struct KqlDatabaseResponse {
    #[serde(default)]
    properties: KqlDatabaseProperties,
}

#[derive(Debug, Deserialize, Default)]
struct KqlDatabaseProperties {
    #[serde(rename = "queryServiceUri", default)]
    query_service_uri: String,
    #[serde(rename = "databaseName", default)]
    database_name: String,
}

pub struct FabricWorkspaceItemsClient {
    client: reqwest::Client,
    api_base_url: String,
    credential: CredentialFn,
}

impl FabricWorkspaceItemsClient {
    pub fn new(api_base_url: impl Into<String>, credential: CredentialFn) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into(),
            credential,
        }
    }
}

#[async_trait]
impl WorkspaceItemsClient for FabricWorkspaceItemsClient {
    async fn list_items(&self, workspace_id: &str) -> Result<Vec<WorkspaceItem>> {
        let token = (self.credential)()?;
        let url = format!("{}/workspaces/{workspace_id}/items", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?;

        let parsed: ListItemsResponse = response.json().await.map_err(|e| Error::Http(e.to_string()))?;

        Ok(parsed
            .value
            .into_iter()
            .map(|item| WorkspaceItem {
                id: item.id,
                display_name: item.display_name,
                item_type: item.item_type,
            })
            .collect())
    }

    async fn kql_database_detail(
        &self,
        workspace_id: &str,
        item_id: &str,
    ) -> Result<KqlDatabaseDetail> {
        let token = (self.credential)()?;
        let url = format!("{}/workspaces/{workspace_id}/kqlDatabases/{item_id}", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?;

        let parsed: KqlDatabaseResponse = response.json().await.map_err(|e| Error::Http(e.to_string()))?;

        let database_name = if parsed.properties.database_name.is_empty() {
            item_id.to_string()
        } else {
            parsed.properties.database_name
        };

        Ok(KqlDatabaseDetail {
            query_service_uri: parsed.properties.query_service_uri,
            database_name,
        })
    }
}
