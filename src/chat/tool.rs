use std::collections::HashMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Represents a parameter in a function tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterProperty {
    /// The type of the parameter (e.g. "string", "number", "array", etc)
    #[serde(rename = "type", default)]
    pub property_type: String,
    /// Description of what the parameter does
    #[serde(default)]
    pub description: String,
}

/// Represents the parameters schema for a function tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParametersSchema {
    /// The type of the parameters object (usually "object")
    #[serde(rename = "type", default)]
    pub schema_type: String,
    /// Map of parameter names to their properties
    #[serde(default)]
    pub properties: HashMap<String, ParameterProperty>,
    /// List of required parameter names
    #[serde(default)]
    pub required: Vec<String>,
}

/// Represents a function definition for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    /// Name of the function
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON Schema describing the parameters; configuration may supply it as a
    /// JSON-encoded string
    #[serde(default = "empty_object", deserialize_with = "schema_value")]
    pub parameters: Value,
}

/// Represents a tool that can be used in chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// The type of tool (e.g. "function")
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    /// The function definition if this is a function tool
    pub function: FunctionTool,
}

impl Tool {
    /// Creates a function tool.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: function_type(),
            function: FunctionTool {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Decodes the parameters JSON schema.
    pub fn parameters_schema(&self) -> Result<ParametersSchema, serde_json::Error> {
        ParametersSchema::deserialize(&self.function.parameters)
    }
}

/// Forces the model to call the named function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Tool(String),
}

impl Serialize for ToolChoice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ToolChoice::Tool(name) => serialize_tool_choice(name, serializer),
        }
    }
}

fn serialize_tool_choice<S>(name: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(2))?;
    map.serialize_entry("type", "function")?;

    let mut function_obj = HashMap::new();
    function_obj.insert("name", name);

    map.serialize_entry("function", &function_obj)?;
    map.end()
}

fn function_type() -> String {
    "function".to_string()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn schema_value<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) if raw.trim().is_empty() => Ok(empty_object()),
        Value::String(raw) => serde_json::from_str(&raw).map_err(de::Error::custom),
        other => Ok(other),
    }
}
