//! The scoped object model an expression is evaluated against.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use flowright_core::{ExecutionId, JsonMap};
use serde_json::Value;

/// `$loop.index` / `$loop.item`, active only inside a loop node's body.
#[derive(Debug, Clone)]
pub struct LoopScope {
    /// Zero-based iteration index.
    pub index: usize,
    /// The current item being processed.
    pub item: Value,
}

/// Everything an expression may reference (§4.1).
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// `$input` -- the Execution's trigger input.
    pub input: Value,
    /// `$node["<id>"].json` -- completed nodes' outputs, keyed by node id.
    pub node_outputs: HashMap<String, Value>,
    /// `$env.<name>` -- whitelisted environment variables only.
    pub env: HashMap<String, String>,
    /// `$execution.id` / `$execution.startedAt`.
    pub execution_id: ExecutionId,
    /// `$execution.startedAt`.
    pub execution_started_at: DateTime<Utc>,
    /// `$vars.<name>` -- global context variables.
    pub vars: JsonMap,
    /// `$loop.*`, set only while evaluating inside a loop body.
    pub loop_scope: Option<LoopScope>,
}

impl EvaluationContext {
    /// Construct a context for a fresh execution with no completed nodes yet.
    pub fn new(input: Value, execution_id: ExecutionId, execution_started_at: DateTime<Utc>) -> Self {
        Self {
            input,
            node_outputs: HashMap::new(),
            env: HashMap::new(),
            execution_id,
            execution_started_at,
            vars: JsonMap::new(),
            loop_scope: None,
        }
    }

    /// Record a node's completed output, making it addressable via `$node`.
    pub fn record_node_output(&mut self, node_id: impl Into<String>, output: Value) {
        self.node_outputs.insert(node_id.into(), output);
    }

    /// Return a context scoped to one iteration of a loop body.
    #[must_use]
    pub fn with_loop_scope(&self, index: usize, item: Value) -> Self {
        let mut ctx = self.clone();
        ctx.loop_scope = Some(LoopScope { index, item });
        ctx
    }
}
