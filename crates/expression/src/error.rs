//! Errors produced while parsing or evaluating an expression.

use thiserror::Error;

/// Failure parsing or evaluating a `{{ expr }}` template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression's root selector is not one of the four (or, inside a
    /// loop body, five) recognized scopes.
    #[error("unknown root `{0}` (expected $input, $node, $env, $execution, $vars, or $loop)")]
    UnknownRoot(String),

    /// The expression's syntax could not be parsed.
    #[error("syntax error in expression `{expr}`: {reason}")]
    Syntax {
        /// The offending expression text.
        expr: String,
        /// Human-readable reason.
        reason: String,
    },

    /// `$node["id"]` referenced a node id with no recorded output yet.
    #[error("no output recorded for node `{0}`")]
    UnknownNode(String),

    /// `$env.name` referenced a name not on the whitelist.
    #[error("environment variable `{0}` is not whitelisted")]
    EnvNotWhitelisted(String),

    /// `$loop` was referenced outside a loop body.
    #[error("$loop referenced outside a loop iteration")]
    LoopNotActive,

    /// `$execution` referenced a field other than `id` or `startedAt`.
    #[error("unknown $execution field `{0}`")]
    UnknownExecutionField(String),
}
