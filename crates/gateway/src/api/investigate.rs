//! `POST /sessions` and `GET /sessions/{id}/events`: start an
//! investigation and stream its SSE reasoning trail.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub scenario: String,
    pub alert_text: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: String,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session = state.registry.create(&body.scenario, &body.alert_text)?;
    state.registry.start(&session.id)?;
    Ok(Json(CreateSessionResponse { id: session.id }))
}

pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(rx) = state.registry.subscribe(&id) else {
        let stream = futures_util::stream::once(async move {
            Ok::<_, std::convert::Infallible>(
                Event::default()
                    .event("error")
                    .data(serde_json::json!({ "message": "session not active" }).to_string()),
            )
        });
        return Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    };

    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn make_sse_stream(
    mut rx: tokio::sync::broadcast::Receiver<inv_domain::sse::SSEEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    let data = event.payload_json().to_string();
                    yield Ok(Event::default().event(event.event_name()).data(data));
                    if terminal {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
