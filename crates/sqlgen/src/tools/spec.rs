//! Declarative tool descriptions.
//!
//! A [`ToolSpec`] is the model-facing half of a tool: its name, a short
//! imperative purpose, optional usage guidance, and an ordered list of
//! primitive parameters. The JSON Schema sent to the provider is derived
//! from the parameter list, so schema and documentation never drift apart.

use crate::ToolDef;
use crate::value::{Map, Value, json};

/// Primitive type tag for a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    /// The JSON Schema `type` keyword for this tag.
    pub fn schema_type(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
}

/// A structured tool specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool name (must be unique within a registry).
    pub name: String,
    /// One-sentence imperative purpose: "List the databases".
    pub purpose: String,
    /// When the model should reach for this tool.
    pub when_to_use: Option<String>,
    /// Description of the result object.
    pub output_format: Option<String>,
    /// Parameters in declaration order. All are required.
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Create a new ToolSpec builder.
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            spec: ToolSpec {
                name: name.into(),
                purpose: String::new(),
                when_to_use: None,
                output_format: None,
                params: Vec::new(),
            },
        }
    }

    /// Description string sent to the model.
    pub fn to_description(&self) -> String {
        let mut desc = self.purpose.clone();
        if let Some(when) = &self.when_to_use {
            desc.push_str(&format!("\nWhen to use: {when}"));
        }
        if let Some(output) = &self.output_format {
            desc.push_str(&format!("\nOutput format: {output}"));
        }
        desc
    }

    /// JSON Schema for the arguments object.
    ///
    /// Properties appear in declaration order and every declared parameter
    /// is listed under `required`.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(p.kind.schema_type()));
            if !p.description.is_empty() {
                prop.insert("description".into(), json!(p.description));
            }
            properties.insert(p.name.clone(), Value::Object(prop));
        }
        let required: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert to the `ToolDef` used on the wire.
    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(
            self.name.clone(),
            self.to_description(),
            self.parameters_schema(),
        )
    }
}

/// Builder for [`ToolSpec`].
#[derive(Debug, Clone)]
pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.spec.purpose = purpose.into();
        self
    }

    pub fn when_to_use(mut self, when: impl Into<String>) -> Self {
        self.spec.when_to_use = Some(when.into());
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.spec.output_format = Some(format.into());
        self
    }

    /// Declare a required parameter. Order of calls is preserved.
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.spec.params.push(ParamSpec {
            name: name.into(),
            kind,
            description: description.into(),
        });
        self
    }

    pub fn build(self) -> ToolSpec {
        self.spec
    }
}
