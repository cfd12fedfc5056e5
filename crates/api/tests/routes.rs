use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use flowright_api::{build_router, AppState};
use flowright_core::ExecutionId;
use flowright_credential::InMemoryCredentialResolver;
use flowright_eventbus::EventBus;
use flowright_execution::InMemoryExecutionStore;
use flowright_node::NodeRegistry;
use flowright_workflow::InMemoryFlowVersionStore;
use tower::ServiceExt;

fn test_state() -> AppState {
    AppState::new(
        Arc::new(NodeRegistry::new()),
        Arc::new(InMemoryCredentialResolver::new()),
        Arc::new(InMemoryFlowVersionStore::new()),
        Arc::new(InMemoryExecutionStore::new()),
        Arc::new(EventBus::new()),
    )
}

#[tokio::test]
async fn node_types_is_empty_for_a_fresh_registry() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/node-types").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), b"[]");
}

#[tokio::test]
async fn unknown_execution_returns_404() {
    let app = build_router(test_state());
    let id = ExecutionId::new();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/executions/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_on_unknown_execution_is_still_accepted() {
    let app = build_router(test_state());
    let id = ExecutionId::new();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/executions/{id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn start_execution_against_missing_flow_version_is_404() {
    let app = build_router(test_state());
    let flow_version_id = flowright_core::FlowVersionId::new();
    let user_id = flowright_core::UserId::new();
    let body = serde_json::json!({
        "flow_version_id": flow_version_id,
        "user_id": user_id,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/executions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
