//! Session lookup, follow-up turns, listing, and cancellation — everything
//! around the core `Create`/`Run` flow in [`crate::api::investigate`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use inv_domain::model::{Session, SessionSummary};
use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContinueRequest {
    pub message: String,
}

pub async fn continue_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ContinueRequest>,
) -> Result<(), ApiError> {
    state.registry.continue_session(&id, &body.message)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub scenario: Option<String>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<SessionSummary>> {
    let limit = state.config.sessions.max_recent;
    Json(
        state
            .registry
            .list_with_history(query.scenario.as_deref(), limit),
    )
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, (StatusCode, Json<serde_json::Value>)> {
    state.registry.get(&id).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no such session: {id}") })),
        )
    })
}

pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    state.registry.cancel(&id)?;
    Ok(())
}
