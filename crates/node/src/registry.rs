//! Process-wide `node type -> NodeHandler` registry (§4.2).

use std::collections::HashMap;
use std::sync::Arc;

use flowright_action::{HandlerCategory, NodeHandler};
use flowright_schema::ConfigSchema;

use crate::error::NodeRegistryError;

/// One entry's schema summary, as returned by [`NodeRegistry::list_with_schemas`].
#[derive(Debug, Clone)]
pub struct HandlerSummary {
    /// The registered node type key.
    pub node_type: String,
    /// The handler's display name.
    pub display_name: String,
    /// The handler's polymorphic category.
    pub category: HandlerCategory,
    /// The handler's declared config schema.
    pub config_schema: ConfigSchema,
}

/// Maps `node type -> NodeHandler`, populated once at startup and read-only
/// thereafter (§9: "the NodeHandler Registry is read-only after startup").
pub struct NodeRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its declared `node_type`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeRegistryError::AlreadyRegistered`] if the key is taken.
    /// Per §4.2 this should be treated as a fatal startup error by callers.
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) -> Result<(), NodeRegistryError> {
        let key = handler.node_type().to_owned();
        if self.handlers.contains_key(&key) {
            return Err(NodeRegistryError::AlreadyRegistered(key));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Look up a handler by node type.
    ///
    /// # Errors
    ///
    /// Returns [`NodeRegistryError::NotFound`] if no handler is registered.
    pub fn get(&self, node_type: &str) -> Result<Arc<dyn NodeHandler>, NodeRegistryError> {
        self.handlers
            .get(node_type)
            .cloned()
            .ok_or_else(|| NodeRegistryError::NotFound(node_type.to_owned()))
    }

    /// Whether a handler is registered for `node_type`.
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// List every registered handler's schema summary, for editor/API introspection.
    #[must_use]
    pub fn list_with_schemas(&self) -> Vec<HandlerSummary> {
        let mut summaries: Vec<_> = self
            .handlers
            .values()
            .map(|h| HandlerSummary {
                node_type: h.node_type().to_owned(),
                display_name: h.display_name().to_owned(),
                category: h.category(),
                config_schema: h.metadata().config_schema.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        summaries
    }

    /// Distinct categories among registered handlers.
    #[must_use]
    pub fn categories(&self) -> Vec<HandlerCategory> {
        let mut seen = Vec::new();
        for handler in self.handlers.values() {
            let category = handler.category();
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry has no registered handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("count", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowright_action::{HandlerMetadata, NodeContext, NodeExecutionResult};

    struct StubHandler {
        metadata: HandlerMetadata,
    }

    impl StubHandler {
        fn new(node_type: &str, category: HandlerCategory) -> Self {
            Self {
                metadata: HandlerMetadata::new(node_type, node_type, category, "stub"),
            }
        }
    }

    #[async_trait]
    impl NodeHandler for StubHandler {
        fn metadata(&self) -> &HandlerMetadata {
            &self.metadata
        }

        async fn execute(&self, ctx: NodeContext) -> NodeExecutionResult {
            NodeExecutionResult::success(ctx.input)
        }
    }

    fn stub(node_type: &str) -> Arc<dyn NodeHandler> {
        Arc::new(StubHandler::new(node_type, HandlerCategory::Transform))
    }

    #[test]
    fn register_and_get() {
        let mut reg = NodeRegistry::new();
        reg.register(stub("http.request")).unwrap();
        assert!(reg.contains("http.request"));
        assert_eq!(reg.get("http.request").unwrap().node_type(), "http.request");
    }

    #[test]
    fn duplicate_registration_is_fatal() {
        let mut reg = NodeRegistry::new();
        reg.register(stub("a")).unwrap();
        let err = reg.register(stub("a")).unwrap_err();
        assert_eq!(err, NodeRegistryError::AlreadyRegistered("a".into()));
    }

    #[test]
    fn get_missing_is_not_found() {
        let reg = NodeRegistry::new();
        assert!(matches!(
            reg.get("missing"),
            Err(NodeRegistryError::NotFound(_))
        ));
    }

    #[test]
    fn list_with_schemas_is_sorted_by_type() {
        let mut reg = NodeRegistry::new();
        reg.register(stub("zeta")).unwrap();
        reg.register(stub("alpha")).unwrap();
        let list = reg.list_with_schemas();
        assert_eq!(list[0].node_type, "alpha");
        assert_eq!(list[1].node_type, "zeta");
    }

    #[test]
    fn categories_deduplicates() {
        let mut reg = NodeRegistry::new();
        reg.register(Arc::new(StubHandler::new("t1", HandlerCategory::Trigger)))
            .unwrap();
        reg.register(Arc::new(StubHandler::new("t2", HandlerCategory::Trigger)))
            .unwrap();
        reg.register(Arc::new(StubHandler::new("x", HandlerCategory::Transform)))
            .unwrap();
        assert_eq!(reg.categories().len(), 2);
    }

    #[test]
    fn empty_registry_reports_len_zero() {
        let reg = NodeRegistry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
    }
}
