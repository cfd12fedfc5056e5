//! The event shape emitted on every NodeRun transition (§6: "messages
//! `{nodeId, status, at, outputPreview?}` emitted on every NodeRun
//! transition").

use chrono::{DateTime, Utc};
use flowright_core::NodeId;
use flowright_execution::NodeRunStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Byte length a JSON-encoded output is truncated to before becoming a
/// preview. Full output is always available via `GET /executions/{id}/node-runs`.
const OUTPUT_PREVIEW_LIMIT: usize = 2048;

/// One transition of one NodeRun, broadcast to every subscriber of its
/// Execution's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusEvent {
    pub node_id: NodeId,
    pub status: NodeRunStatus,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<Value>,
}

impl NodeStatusEvent {
    #[must_use]
    pub fn new(node_id: NodeId, status: NodeRunStatus, at: DateTime<Utc>) -> Self {
        Self {
            node_id,
            status,
            at,
            output_preview: None,
        }
    }

    /// Attach a preview of `output`, truncating strings and large arrays so
    /// the event stream stays cheap to fan out even for chatty nodes.
    #[must_use]
    pub fn with_output_preview(mut self, output: &Value) -> Self {
        self.output_preview = Some(preview(output));
        self
    }
}

fn preview(value: &Value) -> Value {
    let encoded = value.to_string();
    if encoded.len() <= OUTPUT_PREVIEW_LIMIT {
        return value.clone();
    }
    let truncated: String = encoded.chars().take(OUTPUT_PREVIEW_LIMIT).collect();
    Value::String(format!("{truncated}…"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_kept_verbatim() {
        let event = NodeStatusEvent::new(NodeId::new("n1"), NodeRunStatus::Completed, Utc::now())
            .with_output_preview(&serde_json::json!({"y": 1}));
        assert_eq!(event.output_preview, Some(serde_json::json!({"y": 1})));
    }

    #[test]
    fn long_output_is_truncated() {
        let big = Value::String("x".repeat(OUTPUT_PREVIEW_LIMIT * 2));
        let event = NodeStatusEvent::new(NodeId::new("n1"), NodeRunStatus::Completed, Utc::now())
            .with_output_preview(&big);
        let Some(Value::String(s)) = event.output_preview else {
            panic!("expected a string preview");
        };
        assert!(s.ends_with('…'));
        assert!(s.len() < big.as_str().unwrap().len());
    }
}
