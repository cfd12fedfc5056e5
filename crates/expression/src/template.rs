//! `{{ expr }}` template scanning and recursive interpolation (§4.1).

use serde_json::{Map, Value};

use crate::context::EvaluationContext;
use crate::error::ExpressionError;
use crate::eval::resolve;
use crate::path::{self, ParsedExpr};

/// One scanned piece of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    /// Literal text copied through unchanged.
    Literal(String),
    /// A `{{ expr }}` placeholder, already parsed.
    Expr(ParsedExpr),
}

/// A template string, scanned once and ready to render repeatedly against
/// different contexts.
#[derive(Debug, Clone)]
pub struct Template {
    parts: Vec<Part>,
    /// `true` when the source was exactly one `{{ expr }}` with no
    /// surrounding text -- such templates render to their resolved value's
    /// native JSON type rather than being stringified.
    is_bare_expr: bool,
}

impl Template {
    /// Scan `source` for `{{ }}` placeholders, parsing each expression body.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut expr_count = 0usize;
        let mut has_literal = false;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                has_literal = true;
                parts.push(Part::Literal(rest[..start].to_owned()));
            }
            let after_open = &rest[start + 2..];
            let end = after_open.find("}}").ok_or_else(|| ExpressionError::Syntax {
                expr: source.to_owned(),
                reason: "unterminated '{{' placeholder".to_owned(),
            })?;
            let body = &after_open[..end];
            let parsed = path::parse(body)?;
            parts.push(Part::Expr(parsed));
            expr_count += 1;
            rest = &after_open[end + 2..];
        }
        if !rest.is_empty() {
            has_literal = true;
            parts.push(Part::Literal(rest.to_owned()));
        }

        let is_bare_expr = expr_count == 1 && !has_literal;
        Ok(Self { parts, is_bare_expr })
    }

    /// Render this template against `ctx`.
    ///
    /// A bare `{{ expr }}` template (no surrounding text) returns the
    /// resolved value's native type. Anything with surrounding literal text
    /// always renders to a string, with a missing path contributing an
    /// empty string rather than the literal `null`.
    pub fn render(&self, ctx: &EvaluationContext) -> Result<Value, ExpressionError> {
        if self.is_bare_expr {
            let Part::Expr(expr) = &self.parts[0] else {
                unreachable!("is_bare_expr implies a single Expr part");
            };
            return resolve(expr, ctx);
        }

        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Expr(expr) => {
                    let value = resolve(expr, ctx)?;
                    out.push_str(&stringify(&value));
                }
            }
        }
        Ok(Value::String(out))
    }
}

/// Renders a resolved value for splicing into mixed-text output.
/// `null` contributes nothing (the spec's "missing path -> empty string").
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Recursively interpolate every string found in `template`, preserving the
/// shape of maps and arrays (§4.1's `interpolate(template, ctx) -> same shape`).
pub fn interpolate(template: &Value, ctx: &EvaluationContext) -> Result<Value, ExpressionError> {
    match template {
        Value::String(s) => Template::parse(s)?.render(ctx),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(interpolate(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), interpolate(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowright_core::ExecutionId;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        let mut ctx = EvaluationContext::new(json!({"name": "Ada", "age": 36}), ExecutionId::new(), Utc::now());
        ctx.record_node_output("http1", json!({"status": 200, "body": {"items": [1, 2, 3]}}));
        ctx
    }

    #[test]
    fn bare_expr_returns_typed_value() {
        let t = Template::parse("{{ $input.age }}").unwrap();
        assert_eq!(t.render(&ctx()).unwrap(), json!(36));
    }

    #[test]
    fn bare_expr_returns_object_untouched() {
        let t = Template::parse(r#"{{ $node["http1"].json.body }}"#).unwrap();
        assert_eq!(t.render(&ctx()).unwrap(), json!({"items": [1, 2, 3]}));
    }

    #[test]
    fn mixed_text_renders_to_string() {
        let t = Template::parse("Hello {{ $input.name }}, age {{ $input.age }}").unwrap();
        assert_eq!(
            t.render(&ctx()).unwrap(),
            json!("Hello Ada, age 36")
        );
    }

    #[test]
    fn missing_path_in_mixed_text_is_empty_string() {
        let t = Template::parse("value=[{{ $input.nope }}]").unwrap();
        assert_eq!(t.render(&ctx()).unwrap(), json!("value=[]"));
    }

    #[test]
    fn literal_text_with_no_expressions_passes_through() {
        let t = Template::parse("just text").unwrap();
        assert_eq!(t.render(&ctx()).unwrap(), json!("just text"));
    }

    #[test]
    fn unterminated_placeholder_is_syntax_error() {
        let err = Template::parse("Hello {{ $input.name").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { .. }));
    }

    #[test]
    fn interpolate_recurses_into_nested_structures() {
        let tpl = json!({
            "greeting": "Hi {{ $input.name }}",
            "statuses": ["{{ $node[\"http1\"].json.status }}", "static"],
            "raw": {"count": "{{ $node[\"http1\"].json.body.items[-1] }}"},
        });
        let rendered = interpolate(&tpl, &ctx()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "greeting": "Hi Ada",
                "statuses": [200, "static"],
                "raw": {"count": 3},
            })
        );
    }

    #[test]
    fn interpolate_unknown_root_errors() {
        let tpl = json!("{{ $bogus.field }}");
        assert!(matches!(
            interpolate(&tpl, &ctx()),
            Err(ExpressionError::UnknownRoot(_))
        ));
    }
}
