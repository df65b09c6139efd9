//! Structural descriptors for cataloguing record content.
//!
//! Inference is fully recursive. The descriptor is metadata only and is
//! never used to reject content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structural description of a JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schema {
    Null,
    Boolean,
    Number,
    String,
    Array {
        /// Absent for an empty array
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<Items>,
    },
    Object {
        properties: BTreeMap<String, Schema>,
        required: Vec<String>,
    },
}

/// Element descriptor of an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    /// Every element has the same type; the first element's schema
    Uniform(Box<Schema>),
    /// One schema per element type, in first-seen order
    OneOf {
        #[serde(rename = "oneOf")]
        one_of: Vec<Schema>,
    },
}

impl Schema {
    /// The `type` tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Number => "number",
            Schema::String => "string",
            Schema::Array { .. } => "array",
            Schema::Object { .. } => "object",
        }
    }
}

/// Infers [`Schema`]s from content
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaGenerator;

impl SchemaGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, value: &Value) -> Schema {
        generate_schema(value)
    }
}

/// Infer the schema of `value`
pub fn generate_schema(value: &Value) -> Schema {
    match value {
        Value::Null => Schema::Null,
        Value::Bool(_) => Schema::Boolean,
        Value::Number(_) => Schema::Number,
        Value::String(_) => Schema::String,
        Value::Array(elements) => Schema::Array {
            items: array_items(elements),
        },
        Value::Object(map) => {
            let properties: BTreeMap<String, Schema> = map
                .iter()
                .map(|(key, value)| (key.clone(), generate_schema(value)))
                .collect();
            let required = properties.keys().cloned().collect();
            Schema::Object {
                properties,
                required,
            }
        }
    }
}

fn array_items(elements: &[Value]) -> Option<Items> {
    // first schema seen for each element type
    let mut distinct: Vec<Schema> = Vec::new();
    for element in elements {
        let schema = generate_schema(element);
        if !distinct.iter().any(|s| s.type_name() == schema.type_name()) {
            distinct.push(schema);
        }
    }

    match distinct.len() {
        0 => None,
        1 => distinct.pop().map(|schema| Items::Uniform(Box::new(schema))),
        _ => Some(Items::OneOf { one_of: distinct }),
    }
}
