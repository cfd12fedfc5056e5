//! Expression evaluation over an execution's scoped object model (§4.1).
//!
//! A template is a JSON value -- typically a node's `config` -- containing
//! `{{ expr }}` placeholders that reference one of five scopes: the
//! execution's trigger input (`$input`), a prior node's output
//! (`$node["id"].json`), a whitelisted environment variable (`$env`),
//! execution metadata (`$execution`), global context variables (`$vars`),
//! or, inside a loop body, the current iteration (`$loop`).
//!
//! ```
//! use chrono::Utc;
//! use flowright_core::ExecutionId;
//! use flowright_expression::{interpolate, EvaluationContext};
//! use serde_json::json;
//!
//! let ctx = EvaluationContext::new(json!({"name": "Ada"}), ExecutionId::new(), Utc::now());
//! let rendered = interpolate(&json!("Hello {{ $input.name }}"), &ctx).unwrap();
//! assert_eq!(rendered, json!("Hello Ada"));
//! ```

mod context;
mod error;
mod eval;
mod path;
mod template;

pub use context::{EvaluationContext, LoopScope};
pub use error::ExpressionError;
pub use eval::resolve;
pub use path::{parse, ExecutionField, LoopField, ParsedExpr, Root};
pub use template::{interpolate, Template};

/// Commonly imported items.
pub mod prelude {
    pub use crate::{interpolate, EvaluationContext, ExpressionError, Template};
}
