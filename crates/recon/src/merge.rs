use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::Value;

/// Merge `source` on top of `target`, producing a new value.
///
/// Objects merge key by key (recursing into object-valued keys). Anything
/// else in `source`, sequences included, replaces the target wholesale, so
/// a sequence is never reshaped into a keyed object. A non-object target
/// under an object source is treated as empty.
pub fn deep_merge(target: &Value, source: &Value) -> Value {
    let Value::Object(src) = source else {
        return source.clone();
    };

    let mut out: BTreeMap<String, Value> = match target {
        Value::Object(map) => (**map).clone(),
        _ => BTreeMap::new(),
    };

    for (key, incoming) in src.iter() {
        let merged = if incoming.is_object() {
            let base = out.get(key).cloned().unwrap_or_default();
            deep_merge(&base, incoming)
        } else {
            incoming.clone()
        };
        out.insert(key.clone(), merged);
    }

    Value::Object(Arc::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merge_json(target: serde_json::Value, source: serde_json::Value) -> serde_json::Value {
        deep_merge(&Value::from(target), &Value::from(source)).into()
    }

    #[test]
    fn nested_objects_merge_key_by_key() {
        let merged = merge_json(
            json!({ "borrower": { "name": "Acme", "sector": "Retail" }, "keep": 1 }),
            json!({ "borrower": { "sector": "Wholesale", "hq": "Leeds" } }),
        );
        assert_eq!(
            merged,
            json!({ "borrower": { "name": "Acme", "sector": "Wholesale", "hq": "Leeds" }, "keep": 1 })
        );
    }

    #[test]
    fn sequences_are_replaced_not_merged() {
        let merged = merge_json(
            json!({ "ratings": [{ "agency": "S&P" }, { "agency": "Fitch" }] }),
            json!({ "ratings": [{ "agency": "Moody's" }] }),
        );
        assert_eq!(merged, json!({ "ratings": [{ "agency": "Moody's" }] }));
    }

    #[test]
    fn object_source_over_missing_or_scalar_target() {
        assert_eq!(
            merge_json(json!({}), json!({ "a": { "b": 1 } })),
            json!({ "a": { "b": 1 } })
        );
        assert_eq!(
            merge_json(json!({ "a": "flat" }), json!({ "a": { "b": 1 } })),
            json!({ "a": { "b": 1 } })
        );
    }

    #[test]
    fn scalar_source_wins() {
        assert_eq!(merge_json(json!({ "a": 1 }), json!(null)), json!(null));
        assert_eq!(merge_json(json!({ "a": { "b": 1 } }), json!({ "a": 5 })), json!({ "a": 5 }));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let target = Value::from(json!({ "a": { "b": 1 } }));
        let source = Value::from(json!({ "a": { "c": 2 } }));
        let snapshot = target.clone();
        let _ = deep_merge(&target, &source);
        assert_eq!(target, snapshot);
        assert_eq!(serde_json::Value::from(source), json!({ "a": { "c": 2 } }));
    }
}
