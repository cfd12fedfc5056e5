//! JSON-schema-like config description for node handlers.
//!
//! A [`NodeHandler::config_schema`](../flowright_action/trait.NodeHandler.html)
//! returns a [`ConfigSchema`] built from this crate. The graph validator
//! (C5) uses it to check that a node's `config` map has the right shape
//! before any execution starts (§4.5 invariant 2).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The primitive shape a config field's value must take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FieldType {
    /// A UTF-8 string, possibly an expression template.
    String,
    /// A JSON number.
    Number,
    /// A boolean flag.
    Boolean,
    /// One of a fixed set of string options.
    Enum {
        /// The allowed values.
        options: Vec<String>,
    },
    /// An arbitrary JSON object (escape hatch for free-form config).
    Object,
    /// A JSON array.
    Array,
}

/// Description of a single config field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// The config map key this field occupies.
    pub key: String,
    /// Human-readable label for the editor UI.
    pub label: String,
    /// The field's expected shape.
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Default value used when the field is absent and not required.
    pub default: Option<Value>,
    /// Short help text shown in the editor.
    pub description: Option<String>,
}

impl FieldSchema {
    /// Start building a required field of the given type.
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            required: false,
            default: None,
            description: None,
        }
    }

    /// Mark the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Attach help text.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check whether `value` matches this field's declared [`FieldType`].
    #[must_use]
    pub fn matches_type(&self, value: &Value) -> bool {
        match &self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
            FieldType::Enum { options } => {
                value.as_str().is_some_and(|s| options.iter().any(|o| o == s))
            }
        }
    }
}

/// The full config shape declared by a node handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    /// Declared fields, in editor display order.
    pub fields: Vec<FieldSchema>,
}

/// One schema violation, keyed by the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// The config key that failed validation.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ConfigSchema {
    /// An empty schema (no declared fields; any config is accepted as-is).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a field, returning `self` for chaining.
    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate `config` against the declared fields.
    ///
    /// Checks presence of required fields and basic type matching; it does
    /// not evaluate expression templates (those are runtime values) --
    /// `FieldType::String` values containing `{{ }}` always pass the
    /// string-shape check regardless of what they interpolate to.
    pub fn validate(&self, config: &serde_json::Map<String, Value>) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        for field in &self.fields {
            match config.get(&field.key) {
                Some(value) => {
                    if !field.matches_type(value) {
                        violations.push(SchemaViolation {
                            field: field.key.clone(),
                            message: format!("expected {:?}, got {value}", field.field_type),
                        });
                    }
                }
                None if field.required => {
                    violations.push(SchemaViolation {
                        field: field.key.clone(),
                        message: "required field is missing".to_owned(),
                    });
                }
                None => {}
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> ConfigSchema {
        ConfigSchema::empty()
            .with_field(FieldSchema::new("url", "URL", FieldType::String).required())
            .with_field(FieldSchema::new(
                "method",
                "Method",
                FieldType::Enum {
                    options: vec!["GET".into(), "POST".into()],
                },
            ))
            .with_field(FieldSchema::new("timeout_ms", "Timeout", FieldType::Number).with_default(json!(5000)))
    }

    #[test]
    fn missing_required_field_is_violation() {
        let schema = sample_schema();
        let config = json!({}).as_object().unwrap().clone();
        let violations = schema.validate(&config);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "url");
    }

    #[test]
    fn valid_config_has_no_violations() {
        let schema = sample_schema();
        let config = json!({"url": "https://example.com", "method": "GET"})
            .as_object()
            .unwrap()
            .clone();
        assert!(schema.validate(&config).is_empty());
    }

    #[test]
    fn wrong_type_is_violation() {
        let schema = sample_schema();
        let config = json!({"url": 42}).as_object().unwrap().clone();
        let violations = schema.validate(&config);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "url");
    }

    #[test]
    fn enum_rejects_unknown_option() {
        let schema = sample_schema();
        let config = json!({"url": "x", "method": "DELETE"})
            .as_object()
            .unwrap()
            .clone();
        let violations = schema.validate(&config);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "method");
    }

    #[test]
    fn optional_field_absent_is_fine() {
        let schema = sample_schema();
        let config = json!({"url": "x"}).as_object().unwrap().clone();
        assert!(schema.validate(&config).is_empty());
    }

    #[test]
    fn string_field_accepts_template_syntax() {
        let schema = sample_schema();
        let config = json!({"url": "{{ $input.base_url }}"})
            .as_object()
            .unwrap()
            .clone();
        assert!(schema.validate(&config).is_empty());
    }
}
