//! Structural mapping between JSON and [`ObjectTree`]

use serde_json::{Map, Value};

use super::CodecError;
use crate::api::tree::{Field, ObjectTree};

pub fn to_value(tree: &ObjectTree) -> Value {
    let mut map = Map::new();
    for (name, field) in tree.iter() {
        map.insert(name.to_string(), field_to_value(field));
    }
    Value::Object(map)
}

fn field_to_value(field: &Field) -> Value {
    match field {
        Field::Text(text) => Value::String(text.clone()),
        Field::Number(number) => Value::Number(number.clone()),
        Field::Bool(flag) => Value::Bool(*flag),
        Field::Date(_) | Field::Timestamp(_) => Value::String(field.as_text().unwrap_or_default()),
        Field::Null => Value::Null,
        Field::Tree(tree) => to_value(tree),
        Field::List(items) => Value::Array(items.iter().map(field_to_value).collect()),
    }
}

pub fn encode(tree: &ObjectTree) -> Result<String, CodecError> {
    serde_json::to_string(&to_value(tree)).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn value_to_field(value: Value) -> Field {
    match value {
        Value::Null => Field::Null,
        Value::Bool(flag) => Field::Bool(flag),
        Value::Number(number) => Field::Number(number),
        Value::String(text) => Field::Text(text),
        Value::Array(items) => Field::List(items.into_iter().map(value_to_field).collect()),
        Value::Object(map) => Field::Tree(map_to_tree(map)),
    }
}

fn map_to_tree(map: Map<String, Value>) -> ObjectTree {
    let mut tree = ObjectTree::new();
    for (name, value) in map {
        tree.insert(name, value_to_field(value));
    }
    tree
}

/// Parse a body whose top level must be a JSON object
pub fn decode(body: &str) -> Result<ObjectTree, CodecError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map_to_tree(map)),
        Ok(other) => Err(CodecError::Malformed(format!("expected a JSON object, got {}", other))),
        Err(e) => Err(CodecError::Malformed(e.to_string())),
    }
}
