//! The uniform handler trait every node type implements (§4.3).

use async_trait::async_trait;
use flowright_core::JsonMap;
use flowright_schema::SchemaViolation;

use crate::context::NodeContext;
use crate::metadata::{HandlerCategory, HandlerMetadata, InterfaceDefinition};
use crate::result::NodeExecutionResult;

/// A plugin implementing one node type's execution semantics.
///
/// Handlers are stateless across invocations: every piece of per-invocation
/// state arrives via [`NodeContext`] and every outcome leaves via
/// [`NodeExecutionResult`]. The registry (C2) holds one boxed instance per
/// `node_type`, shared across every concurrent Execution.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Static metadata: type, display name, category, description, icon,
    /// config schema, interface definition, async support, credential type.
    fn metadata(&self) -> &HandlerMetadata;

    /// Shorthand for `metadata().node_type`.
    fn node_type(&self) -> &str {
        &self.metadata().node_type
    }

    /// Shorthand for `metadata().display_name`.
    fn display_name(&self) -> &str {
        &self.metadata().display_name
    }

    /// Shorthand for `metadata().category`.
    fn category(&self) -> HandlerCategory {
        self.metadata().category
    }

    /// Shorthand for `metadata().interface`.
    fn interface(&self) -> &InterfaceDefinition {
        &self.metadata().interface
    }

    /// Whether this handler may return `Waiting` and resume later.
    fn supports_async(&self) -> bool {
        self.metadata().supports_async
    }

    /// Validate a node's config against the declared schema.
    ///
    /// The default implementation delegates to `metadata().config_schema`;
    /// handlers with validation the schema can't express (cross-field
    /// constraints, etc.) should override this.
    fn validate_config(&self, config: &JsonMap) -> Vec<SchemaViolation> {
        self.metadata().config_schema.validate(config)
    }

    /// Execute the node for one invocation.
    async fn execute(&self, ctx: NodeContext) -> NodeExecutionResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeContext;
    use flowright_core::{ExecutionId, NodeId};
    use flowright_schema::{ConfigSchema, FieldSchema, FieldType};
    use serde_json::json;

    struct NoOpHandler {
        metadata: HandlerMetadata,
    }

    impl NoOpHandler {
        fn new() -> Self {
            Self {
                metadata: HandlerMetadata::new(
                    "test.noop",
                    "No-Op",
                    HandlerCategory::Transform,
                    "Passes input through unchanged",
                )
                .with_config_schema(
                    ConfigSchema::empty()
                        .with_field(FieldSchema::new("label", "Label", FieldType::String).required()),
                ),
            }
        }
    }

    #[async_trait]
    impl NodeHandler for NoOpHandler {
        fn metadata(&self) -> &HandlerMetadata {
            &self.metadata
        }

        async fn execute(&self, ctx: NodeContext) -> NodeExecutionResult {
            NodeExecutionResult::success(ctx.input)
        }
    }

    #[test]
    fn default_accessors_delegate_to_metadata() {
        let h = NoOpHandler::new();
        assert_eq!(h.node_type(), "test.noop");
        assert_eq!(h.display_name(), "No-Op");
        assert_eq!(h.category(), HandlerCategory::Transform);
        assert!(!h.supports_async());
        assert!(h.interface().declares_handle("main"));
    }

    #[test]
    fn validate_config_delegates_to_schema() {
        let h = NoOpHandler::new();
        let violations = h.validate_config(json!({}).as_object().unwrap());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "label");
    }

    #[tokio::test]
    async fn execute_passes_input_through() {
        let h = NoOpHandler::new();
        let ctx = NodeContext::new(
            ExecutionId::new(),
            NodeId::new("n1"),
            json!({"x": 1}).as_object().unwrap().clone(),
            JsonMap::new(),
        );
        let result = h.execute(ctx).await;
        match result {
            NodeExecutionResult::Success { output, .. } => {
                assert_eq!(output.get("x"), Some(&json!(1)));
            }
            _ => panic!("expected Success"),
        }
    }
}
