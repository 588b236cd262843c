//! JSON body decoding with the DoS limit walk.

use serde_json::Value;

use crate::config::JsonLimits;
use crate::error::BodyError;

/// Object keys that enable prototype pollution in scripting clients.
const PROTOTYPE_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Decode and validate a JSON body against the configured limits.
pub fn decode(text: &str, limits: &JsonLimits) -> Result<Value, BodyError> {
    if text.len() > limits.max_size {
        return Err(BodyError::JsonTooLarge {
            size: text.len(),
            limit: limits.max_size,
        });
    }
    let value: Value = serde_json::from_str(text)?;
    walk(&value, 1, limits)?;
    Ok(value)
}

/// Recursive limit check. The root value is at depth 1.
fn walk(value: &Value, depth: usize, limits: &JsonLimits) -> Result<(), BodyError> {
    if depth > limits.max_depth {
        return Err(BodyError::JsonTooDeep {
            limit: limits.max_depth,
        });
    }

    match value {
        Value::Object(map) => {
            if map.len() > limits.max_keys {
                return Err(BodyError::JsonTooManyKeys {
                    limit: limits.max_keys,
                });
            }
            for (key, child) in map {
                if key.len() > limits.max_string_length {
                    return Err(BodyError::JsonStringTooLong {
                        limit: limits.max_string_length,
                    });
                }
                if !limits.allow_prototype_properties && PROTOTYPE_KEYS.contains(&key.as_str()) {
                    return Err(BodyError::PrototypePollution);
                }
                walk(child, depth + 1, limits)?;
            }
        }
        Value::Array(items) => {
            if items.len() > limits.max_array_length {
                return Err(BodyError::JsonArrayTooLong {
                    limit: limits.max_array_length,
                });
            }
            for item in items {
                walk(item, depth + 1, limits)?;
            }
        }
        Value::String(s) => {
            if s.len() > limits.max_string_length {
                return Err(BodyError::JsonStringTooLong {
                    limit: limits.max_string_length,
                });
            }
        }
        _ => {}
    }
    Ok(())
}
