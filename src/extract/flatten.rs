use serde_json::Value;

use crate::models::{FieldValue, Record};

/// Flatten one raw record into scalar fields.
///
/// Nested objects and arrays holding composites become compact JSON text,
/// arrays of scalars become a `", "`-joined string. Every input key yields an
/// output field.
pub fn flatten(raw: &Value) -> Record {
    match raw {
        Value::Object(obj) => obj
            .iter()
            .map(|(key, value)| (key.clone(), flatten_value(value)))
            .collect(),
        other => {
            let mut record = Record::new();
            record.insert("value", flatten_value(other));
            record
        }
    }
}

pub fn flatten_value(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => FieldValue::Number(n.clone()),
        Value::String(s) => FieldValue::Text(s.clone()),
        Value::Object(_) => FieldValue::Text(to_compact_json(value)),
        Value::Array(items) if items.is_empty() => FieldValue::Text("[]".to_string()),
        Value::Array(items) if items.iter().all(is_scalar) => {
            FieldValue::Text(join_scalars(items))
        }
        Value::Array(_) => FieldValue::Text(to_compact_json(value)),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn join_scalars(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| match v {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn to_compact_json(value: &Value) -> String {
    // Serializing a Value cannot fail: keys are always strings.
    serde_json::to_string(value).unwrap_or_default()
}
