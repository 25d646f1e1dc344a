//! Content-agnostic structural fingerprint of a parsed JSON body, per
//! spec.md §4.7 and §6.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

const TYPE_OBJECT: u8 = 0;
const TYPE_ARRAY: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_NUMBER: u8 = 3;
const TYPE_BOOLEAN: u8 = 4;
const TYPE_NULL: u8 = 5;

/// Hex-encoded SHA-256 over a minified canonical JSON encoding of `value`'s
/// shape descriptor. Map keys are sorted lexicographically so that
/// reordering an object's keys does not change the hash.
pub fn shape_hash(value: &Value) -> String {
    let descriptor = descriptor_of(value);
    let canonical = serde_json::to_string(&descriptor).expect("descriptor is always serializable");
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

fn descriptor_of(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map
                .iter()
                .map(|(key, v)| (key.clone(), json!({ "key": key, "hash": descriptor_of(v) })))
                .collect();
            fields.sort_by(|(a, _), (b, _)| a.cmp(b));
            json!({
                "type": TYPE_OBJECT,
                "fields": fields.into_iter().map(|(_, v)| v).collect::<Vec<_>>(),
            })
        }
        Value::Array(items) => json!({
            "type": TYPE_ARRAY,
            "items": items.iter().map(descriptor_of).collect::<Vec<_>>(),
        }),
        Value::String(_) => json!({ "type": TYPE_STRING }),
        Value::Number(_) => json!({ "type": TYPE_NUMBER }),
        Value::Bool(_) => json!({ "type": TYPE_BOOLEAN }),
        Value::Null => json!({ "type": TYPE_NULL }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reshuffled_keys_hash_identically() {
        let a = json!({"user": "u", "password": "p"});
        let b = json!({"password": "x", "user": "y"});
        assert_eq!(shape_hash(&a), shape_hash(&b));
    }

    #[test]
    fn different_shapes_hash_differently() {
        let a = json!({"user": "u"});
        let b = json!({"user": 1});
        assert_ne!(shape_hash(&a), shape_hash(&b));
    }

    #[test]
    fn empty_array_is_stable() {
        let a = json!([]);
        let b = json!([]);
        assert_eq!(shape_hash(&a), shape_hash(&b));
    }
}
