use serde_json::{Map, Number};

use super::{Struct, Value};
use crate::errors::ValueErrors;
use crate::path::{FieldPath, Segment};

pub(super) fn to_json(value: &Value, path: &mut FieldPath) -> Result<serde_json::Value, ValueErrors> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Float(x) => match Number::from_f64(*x) {
            Some(n) => serde_json::Value::Number(n),
            None => {
                return Err(ValueErrors::single(
                    path.clone(),
                    format!("cannot convert non-finite float {x} to JSON"),
                ))
            }
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Struct(s) => {
            let mut map = Map::new();
            for (name, field) in s.fields.iter() {
                path.push(Segment::Field(name.clone()));
                let converted = to_json(field, path);
                path.pop();
                map.insert(name.clone(), converted?);
            }
            serde_json::Value::Object(map)
        }
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(Segment::Index(i));
                let converted = to_json(item, path);
                path.pop();
                out.push(converted?);
            }
            serde_json::Value::Array(out)
        }
        Value::Bottom(message) => return Err(ValueErrors::single(path.clone(), message.clone())),
        incomplete => {
            return Err(ValueErrors::single(
                path.clone(),
                format!("cannot convert incomplete value {incomplete} to JSON"),
            ))
        }
    })
}

/// Plain data compiles to open structs.
pub(super) fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Struct(Struct {
            fields: map.iter().map(|(k, v)| (k.clone(), from_json(v))).collect(),
            closed: false,
        }),
    }
}
