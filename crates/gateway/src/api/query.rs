//! `/scenarios/{scenario}/query/graph` and `/scenarios/{scenario}/query/telemetry`
//! — the callback routes a provisioned agent's OpenAPI tool calls back into,
//! per the `query_graph`/`query_telemetry` tool specs rendered by
//! `inv_provisioner::openapi::render_spec`. Each call goes through the
//! scenario's `BackendFactory`-built backend behind its connector's
//! `ThrottleGate`.

use axum::extract::{Path, State};
use axum::Json;
use inv_backends::model::{QueryParams, QueryResult};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

fn params_for(config: &inv_domain::model::BackendConfig, continuation_token: Option<String>) -> QueryParams {
    QueryParams {
        continuation_token,
        workspace_id: config.workspace_id.clone(),
        graph_name: config.graph_name.clone(),
        database_name: config.database_name.clone(),
    }
}

pub async fn execute_graph_query(
    State(state): State<AppState>,
    Path(scenario): Path<String>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let manifest = state
        .manifests
        .get(&scenario)
        .ok_or_else(|| inv_domain::Error::ScenarioUnknown(scenario.clone()))?;

    let backend = state
        .backend_factory
        .graph_backend(&scenario, &manifest.data_sources)?;
    let throttle = state
        .backend_factory
        .throttle_for(&manifest.data_sources.graph.connector);

    let permit = throttle.acquire().await?;
    let params = params_for(&manifest.data_sources.graph.config, body.continuation_token);
    let result = backend.execute_query(&body.query, params).await?;
    drop(permit);

    throttle.record_success();
    Ok(Json(result))
}

pub async fn execute_telemetry_query(
    State(state): State<AppState>,
    Path(scenario): Path<String>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let manifest = state
        .manifests
        .get(&scenario)
        .ok_or_else(|| inv_domain::Error::ScenarioUnknown(scenario.clone()))?;

    let backend = state
        .backend_factory
        .telemetry_backend(&scenario, &manifest.data_sources)?;
    let throttle = state
        .backend_factory
        .throttle_for(&manifest.data_sources.telemetry.connector);

    let permit = throttle.acquire().await?;
    let params = params_for(&manifest.data_sources.telemetry.config, body.continuation_token);
    let result = backend.execute_query(&body.query, params).await?;
    drop(permit);

    throttle.record_success();
    Ok(Json(result))
}
