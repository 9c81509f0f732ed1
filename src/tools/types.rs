//! JSON Schema parameter declarations for tools.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Parameter schema of a tool, always a JSON Schema `object`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentToolParameters {
    pub schema: Value,
}

impl AgentToolParameters {
    /// Wrap a schema received from elsewhere.
    ///
    /// Completion APIs reject function parameters without `"type": "object"`,
    /// so a schema missing it gets it added; anything that is not a JSON
    /// object is replaced by the empty schema.
    pub fn from_schema(schema: Value) -> Self {
        match schema {
            Value::Object(mut map) => {
                map.entry("type").or_insert_with(|| json!("object"));
                map.entry("properties").or_insert_with(|| json!({}));
                Self {
                    schema: Value::Object(map),
                }
            }
            _ => Self::empty(),
        }
    }

    /// A tool that takes no arguments.
    pub fn empty() -> Self {
        Self::object().build()
    }

    pub fn object() -> SchemaBuilder {
        SchemaBuilder::default()
    }
}

/// Accumulates object properties for [`AgentToolParameters`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Declare a string property.
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({ "type": "string", "description": description }), required)
    }

    /// Declare a property with an arbitrary sub-schema.
    pub fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> AgentToolParameters {
        AgentToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}
