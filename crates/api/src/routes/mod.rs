mod events;
mod executions;
mod node_types;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/executions", post(executions::start_execution))
        .route("/executions/{id}", get(executions::get_execution))
        .route("/executions/{id}/cancel", post(executions::cancel_execution))
        .route("/executions/{id}/node-runs", get(executions::list_node_runs))
        .route("/executions/{id}/resume", post(executions::resume_execution))
        .route("/executions/{id}/events", get(events::node_status_stream))
        .route("/node-types", get(node_types::list_node_types))
}
