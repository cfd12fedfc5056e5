//! Resolving a parsed expression against an [`EvaluationContext`].

use flowright_core::get_path;
use serde_json::Value;

use crate::context::EvaluationContext;
use crate::error::ExpressionError;
use crate::path::{ExecutionField, LoopField, ParsedExpr, Root};

/// Resolve a parsed expression to a JSON value.
///
/// A missing path within an otherwise-valid root resolves to `Value::Null`
/// -- callers that need the spec's "missing path -> empty string" behavior
/// for mixed static/expression templates apply that conversion themselves
/// (see [`crate::template::Template::render`]); a bare single-expression
/// string keeps `Null` as its own typed value rather than stringifying it.
pub fn resolve(expr: &ParsedExpr, ctx: &EvaluationContext) -> Result<Value, ExpressionError> {
    let root_value = match &expr.root {
        Root::Input => ctx.input.clone(),
        Root::Node(id) => ctx
            .node_outputs
            .get(id)
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownNode(id.clone()))?,
        Root::Env(name) => match ctx.env.get(name) {
            Some(value) => Value::String(value.clone()),
            None => return Err(ExpressionError::EnvNotWhitelisted(name.clone())),
        },
        Root::Execution(field) => match field {
            ExecutionField::Id => Value::String(ctx.execution_id.to_string()),
            ExecutionField::StartedAt => Value::String(ctx.execution_started_at.to_rfc3339()),
        },
        Root::Vars(name) => match ctx.vars.get(name) {
            Some(value) => value.clone(),
            None => Value::Null,
        },
        Root::Loop(field) => {
            let scope = ctx
                .loop_scope
                .as_ref()
                .ok_or(ExpressionError::LoopNotActive)?;
            match field {
                LoopField::Index => Value::from(scope.index),
                LoopField::Item => scope.item.clone(),
            }
        }
    };

    if expr.path.is_empty() {
        return Ok(root_value);
    }

    Ok(get_path(&root_value, &expr.path)
        .cloned()
        .unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse;
    use chrono::Utc;
    use flowright_core::ExecutionId;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        let mut ctx = EvaluationContext::new(json!({"x": 1}), ExecutionId::new(), Utc::now());
        ctx.record_node_output("setFields", json!({"y": 1}));
        ctx.vars.insert("region".into(), json!("us-east"));
        ctx.env.insert("API_KEY".into(), "secret".into());
        ctx
    }

    #[test]
    fn resolves_input_field() {
        let e = parse("$input.x").unwrap();
        assert_eq!(resolve(&e, &ctx()).unwrap(), json!(1));
    }

    #[test]
    fn resolves_node_output() {
        let e = parse(r#"$node["setFields"].json.y"#).unwrap();
        assert_eq!(resolve(&e, &ctx()).unwrap(), json!(1));
    }

    #[test]
    fn unknown_node_errors() {
        let e = parse(r#"$node["missing"].json"#).unwrap();
        assert!(matches!(
            resolve(&e, &ctx()),
            Err(ExpressionError::UnknownNode(_))
        ));
    }

    #[test]
    fn missing_path_is_null() {
        let e = parse("$input.nope").unwrap();
        assert_eq!(resolve(&e, &ctx()).unwrap(), Value::Null);
    }

    #[test]
    fn resolves_whitelisted_env() {
        let e = parse("$env.API_KEY").unwrap();
        assert_eq!(resolve(&e, &ctx()).unwrap(), json!("secret"));
    }

    #[test]
    fn rejects_non_whitelisted_env() {
        let e = parse("$env.SECRET_NOT_LISTED").unwrap();
        assert!(matches!(
            resolve(&e, &ctx()),
            Err(ExpressionError::EnvNotWhitelisted(_))
        ));
    }

    #[test]
    fn resolves_execution_id() {
        let c = ctx();
        let e = parse("$execution.id").unwrap();
        assert_eq!(resolve(&e, &c).unwrap(), json!(c.execution_id.to_string()));
    }

    #[test]
    fn resolves_vars() {
        let e = parse("$vars.region").unwrap();
        assert_eq!(resolve(&e, &ctx()).unwrap(), json!("us-east"));
    }

    #[test]
    fn loop_not_active_errors() {
        let e = parse("$loop.index").unwrap();
        assert!(matches!(
            resolve(&e, &ctx()),
            Err(ExpressionError::LoopNotActive)
        ));
    }

    #[test]
    fn loop_scope_resolves_index_and_item() {
        let c = ctx().with_loop_scope(2, json!({"name": "widget"}));
        let idx = parse("$loop.index").unwrap();
        assert_eq!(resolve(&idx, &c).unwrap(), json!(2));
        let item = parse("$loop.item.name").unwrap();
        assert_eq!(resolve(&item, &c).unwrap(), json!("widget"));
    }

    #[test]
    fn negative_index_into_node_array() {
        let mut c = ctx();
        c.record_node_output("list", json!({"items": [1, 2, 3]}));
        let e = parse(r#"$node["list"].json.items[-1]"#).unwrap();
        assert_eq!(resolve(&e, &c).unwrap(), json!(3));
    }
}
