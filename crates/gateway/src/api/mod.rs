pub mod error;
pub mod investigate;
pub mod query;
pub mod sessions;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the API router. No auth middleware: authorization is explicitly
/// out of scope — the gateway expects to sit behind a reverse proxy or
/// sidecar that handles it.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(investigate::create_session).get(sessions::list_sessions))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/events", get(investigate::session_events))
        .route("/sessions/:id/continue", post(sessions::continue_session))
        .route("/sessions/:id/cancel", post(sessions::cancel_session))
        .route("/scenarios/:scenario/query/graph", post(query::execute_graph_query))
        .route("/scenarios/:scenario/query/telemetry", post(query::execute_telemetry_query))
        .layer(TraceLayer::new_for_http())
}
