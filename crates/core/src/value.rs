//! The dynamic JSON value used at every internal routing boundary.
//!
//! Per the engine's design notes, internal routing stays dynamic
//! (`serde_json::Value`) while only the edges of the system -- node I/O
//! shapes, expression scopes -- get explicit tagged types. This module
//! centralizes the small set of helpers every crate needs when walking
//! those dynamic maps.

use serde_json::{Map, Value};

/// A JSON object, as produced by trigger input, node output, and config maps.
pub type JsonMap = Map<String, Value>;

/// Merge `patch` into `base`, with `patch` winning on key collisions.
///
/// Used to combine per-output-node results into a single execution output
/// (§4.6 termination rule: "later overwrites earlier on key collision").
pub fn merge_objects(base: &mut JsonMap, patch: &JsonMap) {
    for (k, v) in patch {
        base.insert(k.clone(), v.clone());
    }
}

/// Index into a JSON value with a dotted/bracketed path segment list,
/// as produced by the expression evaluator's path parser.
///
/// Supports object field access, array indexing, and negative indices
/// (`-1` == last element). Returns `None` if any segment fails to resolve.
pub fn get_path<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for seg in segments {
        current = match (seg, current) {
            (PathSegment::Field(name), Value::Object(map)) => map.get(name)?,
            (PathSegment::Index(i), Value::Array(arr)) => {
                let len = arr.len() as i64;
                let idx = if *i < 0 { len + i } else { *i };
                if idx < 0 {
                    return None;
                }
                arr.get(idx as usize)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// One step of a path expression: `.field` or `[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named object field.
    Field(String),
    /// An array index; negative values count from the end.
    Index(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_on_collision() {
        let mut base = json!({"a": 1, "b": 2}).as_object().unwrap().clone();
        let patch = json!({"b": 3, "c": 4}).as_object().unwrap().clone();
        merge_objects(&mut base, &patch);
        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(base.get("b"), Some(&json!(3)));
        assert_eq!(base.get("c"), Some(&json!(4)));
    }

    #[test]
    fn get_path_field_and_index() {
        let v = json!({"items": [{"name": "a"}, {"name": "b"}]});
        let segs = vec![
            PathSegment::Field("items".into()),
            PathSegment::Index(1),
            PathSegment::Field("name".into()),
        ];
        assert_eq!(get_path(&v, &segs), Some(&json!("b")));
    }

    #[test]
    fn get_path_negative_index_is_last() {
        let v = json!({"items": [1, 2, 3]});
        let segs = vec![PathSegment::Field("items".into()), PathSegment::Index(-1)];
        assert_eq!(get_path(&v, &segs), Some(&json!(3)));
    }

    #[test]
    fn get_path_missing_returns_none() {
        let v = json!({"a": 1});
        let segs = vec![PathSegment::Field("missing".into())];
        assert_eq!(get_path(&v, &segs), None);
    }

    #[test]
    fn get_path_type_mismatch_returns_none() {
        let v = json!({"a": 1});
        let segs = vec![PathSegment::Index(0)];
        assert_eq!(get_path(&v, &segs), None);
    }
}
