//! Minimal property updates between two documents.

use serde_json::{Map, Value};

/// Entries of `current` that differ from `previous`
///
/// Arrays are compared element by element in order, nested objects are
/// compared recursively and dropped when nothing inside them changed. Keys present only in `previous`
/// are not reported since there is nothing to assign for them.
pub fn diff_documents(current: &Value, previous: &Value) -> Value {
    match (current, previous) {
        (Value::Object(current), Value::Object(previous)) => {
            Value::Object(diff_objects(current, previous))
        }
        (Value::Object(current), _) => Value::Object(current.clone()),
        _ => Value::Object(Map::new()),
    }
}

fn diff_objects(current: &Map<String, Value>, previous: &Map<String, Value>) -> Map<String, Value> {
    let mut changed = Map::new();
    for (key, value) in current {
        let Some(old) = previous.get(key) else {
            changed.insert(key.clone(), value.clone());
            continue;
        };
        match (value, old) {
            (Value::Object(a), Value::Object(b)) => {
                let nested = diff_objects(a, b);
                if !nested.is_empty() {
                    changed.insert(key.clone(), Value::Object(nested));
                }
            }
            _ => {
                if value != old {
                    changed.insert(key.clone(), value.clone());
                }
            }
        }
    }
    changed
}
