//! Field merging of partially-written remote values over typed defaults

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Whether two values have the same JSON kind
fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
    )
}

/// Merge `incoming` into `target[key]`. Returns whether anything was written.
///
/// Only keys already present in `target` are accepted. A `null` default
/// accepts any value; otherwise the incoming value must have the same kind.
/// Objects merge key by key under the same rules.
fn merge_field(target: &mut Map<String, Value>, key: &str, incoming: &Value) -> bool {
    let Some(existing) = target.get_mut(key) else {
        return false;
    };
    match (existing, incoming) {
        (Value::Object(inner), Value::Object(source)) => {
            let mut changed = false;
            for (k, v) in source {
                changed |= merge_field(inner, k, v);
            }
            changed
        }
        (existing, incoming) if existing.is_null() || same_kind(existing, incoming) => {
            *existing = incoming.clone();
            true
        }
        _ => false,
    }
}

/// Decode `remote` on top of `defaults`, one top-level field at a time.
///
/// Missing fields keep their default. A field that is unknown, has the wrong
/// JSON kind, or would not deserialize (e.g. an unknown enum variant or an
/// out-of-range number) is skipped and keeps its default as well. Keys in
/// `protected` are never taken from `remote`.
pub fn decode_with_defaults<T>(defaults: &T, remote: &Map<String, Value>, protected: &[&str]) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut merged = match serde_json::to_value(defaults) {
        Ok(Value::Object(fields)) => fields,
        _ => return defaults.clone(),
    };
    let mut decoded = defaults.clone();

    for (key, incoming) in remote {
        if protected.contains(&key.as_str()) {
            continue;
        }
        let mut candidate = merged.clone();
        if !merge_field(&mut candidate, key, incoming) {
            continue;
        }
        match serde_json::from_value::<T>(Value::Object(candidate.clone())) {
            Ok(value) => {
                merged = candidate;
                decoded = value;
            }
            Err(e) => tracing::debug!("Ignoring malformed field '{}': {}", key, e),
        }
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Lamp {
        kind: String,
        on: bool,
        level: u8,
        label: Option<String>,
        window: Window,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Window {
        start: String,
        end: String,
    }

    fn defaults() -> Lamp {
        Lamp {
            kind: "lamp".into(),
            on: false,
            level: 100,
            label: None,
            window: Window {
                start: "06:00".into(),
                end: "07:00".into(),
            },
        }
    }

    fn remote(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_fields_keep_defaults() {
        let decoded = decode_with_defaults(&defaults(), &remote(json!({"on": true})), &[]);
        assert_eq!(decoded, Lamp { on: true, ..defaults() });
    }

    #[test]
    fn test_wrong_kinds_and_ranges_are_skipped() {
        let decoded = decode_with_defaults(
            &defaults(),
            &remote(json!({"on": "yes", "level": 999, "label": "desk", "unknown": 1})),
            &[],
        );
        assert_eq!(
            decoded,
            Lamp {
                label: Some("desk".into()),
                ..defaults()
            }
        );
    }

    #[test]
    fn test_nested_objects_merge_per_key() {
        let decoded = decode_with_defaults(
            &defaults(),
            &remote(json!({"window": {"end": "08:30"}})),
            &[],
        );
        assert_eq!(decoded.window.start, "06:00");
        assert_eq!(decoded.window.end, "08:30");
    }

    #[test]
    fn test_protected_keys_are_ignored() {
        let decoded = decode_with_defaults(
            &defaults(),
            &remote(json!({"kind": "fan", "level": 10})),
            &["kind"],
        );
        assert_eq!(decoded.kind, "lamp");
        assert_eq!(decoded.level, 10);
    }
}
