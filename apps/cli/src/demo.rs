//! A minimal trigger/transform handler pair, registered at startup so
//! `flowright serve` has something runnable out of the box.

use async_trait::async_trait;
use flowright_action::{HandlerCategory, HandlerMetadata, NodeContext, NodeExecutionResult, NodeHandler};

/// Emits its config verbatim as the Execution's starting input.
pub struct ManualTrigger {
    metadata: HandlerMetadata,
}

impl ManualTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: HandlerMetadata::new(
                "manualTrigger",
                "Manual Trigger",
                HandlerCategory::Trigger,
                "starts an execution with its config as input",
            ),
        }
    }
}

impl Default for ManualTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for ManualTrigger {
    fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    async fn execute(&self, ctx: NodeContext) -> NodeExecutionResult {
        NodeExecutionResult::success(ctx.config)
    }
}

/// Passes its upstream input through unchanged.
pub struct PassThrough {
    metadata: HandlerMetadata,
}

impl PassThrough {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: HandlerMetadata::new("passThrough", "Pass Through", HandlerCategory::Transform, "echoes its input"),
        }
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for PassThrough {
    fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    async fn execute(&self, ctx: NodeContext) -> NodeExecutionResult {
        NodeExecutionResult::success(ctx.input)
    }
}
