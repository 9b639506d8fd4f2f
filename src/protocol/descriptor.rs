//! Tool descriptors and parameter specifications.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::Arguments;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// A JSON string.
    String,
    /// A JSON number without fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ParameterType {
    /// Get the JSON Schema name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }

    fn from_schema(value: &Value) -> Self {
        match value.as_str() {
            Some("integer") => ParameterType::Integer,
            Some("number") => ParameterType::Number,
            Some("boolean") => ParameterType::Boolean,
            Some("array") => ParameterType::Array,
            Some("object") => ParameterType::Object,
            _ => ParameterType::String,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Description of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// JSON type of the parameter.
    #[serde(rename = "type")]
    pub kind: ParameterType,

    /// Whether the parameter must be present in a call.
    #[serde(default)]
    pub required: bool,

    /// Human-readable description for LLM consumption.
    #[serde(default)]
    pub description: String,

    /// Allowed values for string parameters.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,

    /// Element type for array parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParameterType>,
}

impl ParameterSpec {
    /// Create a required parameter.
    pub fn required(kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            kind,
            required: true,
            description: description.into(),
            allowed: None,
            items: None,
        }
    }

    /// Create an optional parameter.
    pub fn optional(kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(kind, description)
        }
    }

    /// Restrict a string parameter to a fixed set of values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Set the element type of an array parameter.
    pub fn of(mut self, items: ParameterType) -> Self {
        self.items = Some(items);
        self
    }

    fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.kind.as_str()));
        if !self.description.is_empty() {
            schema.insert("description".into(), json!(self.description));
        }
        if let Some(ref allowed) = self.allowed {
            schema.insert("enum".into(), json!(allowed));
        }
        if let Some(items) = self.items {
            schema.insert("items".into(), json!({ "type": items.as_str() }));
        }
        Value::Object(schema)
    }
}

/// Static description of a tool exposed by a tool server.
///
/// Descriptors are created once at server startup and never change
/// afterwards. The wire form is `{name, description, parameters}`; the
/// decoder also accepts the JSON Schema `inputSchema` form.
///
/// # Example
///
/// ```
/// use cerebro::protocol::{ParameterSpec, ParameterType, ToolDescriptor};
///
/// let descriptor = ToolDescriptor::new("get_order", "Look up one order")
///     .param("order_id", ParameterSpec::required(ParameterType::String, "Order id"));
///
/// let schema = descriptor.input_schema();
/// assert_eq!(schema["required"][0], "order_id");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireDescriptor")]
pub struct ToolDescriptor {
    /// Tool name, unique within one server.
    pub name: String,

    /// Human-readable description for LLM consumption.
    pub description: String,

    /// Parameters keyed by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl ToolDescriptor {
    /// Create a descriptor without parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter using builder pattern.
    pub fn param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    /// Build a descriptor from a JSON Schema object.
    ///
    /// Unknown property types fall back to `string`.
    pub fn from_input_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut parameters = BTreeMap::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (param, prop) in properties {
                let allowed = prop.get("enum").and_then(Value::as_array).map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                });
                let items = prop
                    .get("items")
                    .and_then(|items| items.get("type"))
                    .map(ParameterType::from_schema);
                parameters.insert(
                    param.clone(),
                    ParameterSpec {
                        kind: prop
                            .get("type")
                            .map(ParameterType::from_schema)
                            .unwrap_or(ParameterType::String),
                        required: required.contains(&param.as_str()),
                        description: prop
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        allowed,
                        items,
                    },
                );
            }
        }

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Render the parameters as a JSON Schema object.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| (name.clone(), spec.to_schema()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_parameters().collect::<Vec<_>>(),
        })
    }

    /// Iterate over the names of required parameters.
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Find the first required parameter absent from `arguments`.
    ///
    /// An explicit JSON `null` counts as absent.
    pub fn missing_required(&self, arguments: &Arguments) -> Option<&str> {
        self.required_parameters()
            .find(|name| arguments.get(*name).map_or(true, Value::is_null))
    }
}

/// Decoding shape accepting both descriptor forms.
#[derive(Deserialize)]
struct WireDescriptor {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<BTreeMap<String, ParameterSpec>>,
    #[serde(default, rename = "inputSchema", alias = "input_schema")]
    input_schema: Option<Value>,
}

impl From<WireDescriptor> for ToolDescriptor {
    fn from(wire: WireDescriptor) -> Self {
        let description = wire
            .description
            .unwrap_or_else(|| format!("Tool {}", wire.name));
        match (wire.parameters, wire.input_schema) {
            (Some(parameters), _) => Self {
                name: wire.name,
                description,
                parameters,
            },
            (None, Some(schema)) => Self::from_input_schema(wire.name, description, &schema),
            (None, None) => Self::new(wire.name, description),
        }
    }
}
