//! `GET /node-types` (§6).

use axum::extract::State;
use axum::Json;
use flowright_action::HandlerCategory;
use flowright_schema::ConfigSchema;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NodeTypeSummary {
    pub node_type: String,
    pub display_name: String,
    pub category: &'static str,
    pub config_schema: ConfigSchema,
}

fn category_name(category: HandlerCategory) -> &'static str {
    match category {
        HandlerCategory::Trigger => "trigger",
        HandlerCategory::Transform => "transform",
        HandlerCategory::Branching => "branching",
        HandlerCategory::Loop => "loop",
        HandlerCategory::SubWorkflow => "subWorkflow",
    }
}

pub async fn list_node_types(State(state): State<AppState>) -> Json<Vec<NodeTypeSummary>> {
    let summaries = state
        .registry
        .list_with_schemas()
        .into_iter()
        .map(|h| NodeTypeSummary {
            node_type: h.node_type,
            display_name: h.display_name,
            category: category_name(h.category),
            config_schema: h.config_schema,
        })
        .collect();
    Json(summaries)
}
