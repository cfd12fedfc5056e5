//! Control API (C9): the one piece of the system with external callers.
//! Starts, cancels, and inspects Executions, and streams NodeRun transitions
//! over a per-execution WebSocket (§6).

mod error;
mod routes;
mod state;
mod subflow;

pub use error::ApiError;
pub use state::AppState;
pub use subflow::ControlApiSubFlowStarter;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the full Control API router over `state`.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    routes::router().layer(TraceLayer::new_for_http()).with_state(state)
}
