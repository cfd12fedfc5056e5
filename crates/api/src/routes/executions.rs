//! `POST /executions`, `{id}/cancel`, `GET {id}`, `{id}/node-runs`,
//! `{id}/resume` (§6).

use axum::extract::{Path, State};
use axum::{Json, http::StatusCode};
use flowright_core::{ExecutionId, FlowVersionId, NodeId, UserId};
use flowright_execution::{Execution, NodeRun, Trigger};
use flowright_workflow::GraphValidator;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartExecutionRequest {
    pub flow_version_id: FlowVersionId,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub allow_draft: bool,
    /// Not in the Control API's own auth story (§1 non-goals); the caller
    /// (an authenticated session, a scheduled job) supplies the owning user.
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct StartExecutionResponse {
    pub id: ExecutionId,
    pub status: String,
}

/// `POST /executions` (§6).
pub async fn start_execution(
    State(state): State<AppState>,
    Json(body): Json<StartExecutionRequest>,
) -> Result<(StatusCode, Json<StartExecutionResponse>), ApiError> {
    let flow_version = state
        .flow_versions
        .get(body.flow_version_id)
        .await
        .ok_or(ApiError::FlowVersionNotFound(body.flow_version_id))?;

    if !flow_version.is_published() && !body.allow_draft {
        return Err(ApiError::NotPublished(body.flow_version_id));
    }

    let report = GraphValidator::new(&state.registry).validate(&flow_version.definition)?;

    let execution_id = state
        .store
        .create_execution(
            body.flow_version_id,
            body.user_id,
            body.trigger.unwrap_or(Trigger::Manual),
            body.input,
            None,
        )
        .await;
    let execution = state
        .store
        .find_execution(execution_id)
        .await
        .ok_or(ApiError::ExecutionNotFound(execution_id))?;

    let scheduler = state.scheduler.clone();
    tokio::spawn(async move {
        if let Err(error) = scheduler.execute(&flow_version, &report, execution).await {
            tracing::error!(%execution_id, %error, "execution failed to run to completion");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartExecutionResponse {
            id: execution_id,
            status: "pending".to_owned(),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct CancelExecutionResponse {
    pub status: &'static str,
}

/// `POST /executions/{id}/cancel` -- idempotent (§6, §8 "Cancellation liveness").
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
) -> Json<CancelExecutionResponse> {
    state.scheduler.cancel(id);
    Json(CancelExecutionResponse { status: "cancelling" })
}

/// `GET /executions/{id}` (§6).
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
) -> Result<Json<Execution>, ApiError> {
    state.store.find_execution(id).await.map(Json).ok_or(ApiError::ExecutionNotFound(id))
}

/// `GET /executions/{id}/node-runs` (§6).
pub async fn list_node_runs(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
) -> Result<Json<Vec<NodeRun>>, ApiError> {
    if state.store.find_execution(id).await.is_none() {
        return Err(ApiError::ExecutionNotFound(id));
    }
    Ok(Json(state.store.list_node_runs(id).await))
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub resume_token: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub resumed: bool,
}

/// `POST /executions/{id}/resume` (§6: "used by approvals, webhook correlation").
///
/// The engine's resume token for a generic `Waiting` node is the target
/// `nodeId` itself (§4.3's `resumeToken` is handler-opaque; the Scheduler
/// keys its resume channel by `(executionId, nodeId)`), so `resumeToken`
/// here is expected to be the id of the parked node.
pub async fn resume_execution(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
    Json(body): Json<ResumeRequest>,
) -> Result<Json<ResumeResponse>, ApiError> {
    let node_id = NodeId::new(body.resume_token.clone());
    let resumed = state.scheduler.resume(id, node_id, body.payload);
    if !resumed {
        return Err(ApiError::UnknownResumeToken(body.resume_token));
    }
    Ok(Json(ResumeResponse { resumed }))
}
