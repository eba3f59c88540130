//! JSON schema helpers for tool definitions

use serde_json::{json, Map, Value};

pub fn object_schema() -> SchemaBuilder {
    SchemaBuilder::default()
}

pub fn string_prop(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description
    })
}

/// String restricted to a fixed set of values
pub fn enum_prop(description: &str, values: &[&str]) -> Value {
    json!({
        "type": "string",
        "description": description,
        "enum": values
    })
}

pub fn integer_prop(description: &str) -> Value {
    json!({
        "type": "integer",
        "description": description
    })
}

pub fn boolean_prop(description: &str) -> Value {
    json!({
        "type": "boolean",
        "description": description
    })
}

pub fn array_prop(description: &str, items: Value) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": items
    })
}

/// Schema builder for tool parameters
#[derive(Default)]
pub struct SchemaBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    pub fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required
        })
    }
}
