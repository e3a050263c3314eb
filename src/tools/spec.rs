//! Tool definitions and their provider schemas
//!
//! A [`ToolSpec`] is defined once and rendered three ways: as an OpenAI /
//! Ollama `function` object, as an Anthropic tool with `input_schema`, and
//! as a Gemini function declaration. The same spec also renders the plain
//! text manual that goes into the system prompt.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Semantic type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    /// JSON Schema type name
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }

    /// Gemini OpenAPI type name
    fn gemini_type(&self) -> &'static str {
        match self {
            ParamType::String => "STRING",
            ParamType::Integer => "INTEGER",
            ParamType::Boolean => "BOOLEAN",
        }
    }
}

/// One named parameter of a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolParam {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    /// Allowed values, if the parameter is an enumeration
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl ToolParam {
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            allowed: Vec::new(),
        }
    }

    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Static description of a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Parameters in declaration order
    pub params: Vec<ToolParam>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, params: Vec<ToolParam>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
        }
    }

    /// Names of the required parameters, in declaration order
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter(|p| p.required).map(|p| p.name.as_str())
    }

    fn schema_object(&self, type_name: fn(&ParamType) -> &'static str, object: &str) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = json!({
                "type": type_name(&param.kind),
                "description": param.description,
            });
            if !param.allowed.is_empty() {
                prop["enum"] = json!(param.allowed);
            }
            properties.insert(param.name.clone(), prop);
        }
        json!({
            "type": object,
            "properties": properties,
            "required": self.required_params().collect::<Vec<_>>(),
        })
    }

    /// JSON Schema for the parameters object
    pub fn json_schema(&self) -> Value {
        self.schema_object(ParamType::json_type, "object")
    }

    /// OpenAI / Ollama `tools[]` entry
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.json_schema(),
            }
        })
    }

    /// Anthropic `tools[]` entry
    pub fn to_anthropic(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.json_schema(),
        })
    }

    /// Gemini `functionDeclarations[]` entry
    pub fn to_gemini(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.schema_object(ParamType::gemini_type, "OBJECT"),
        })
    }

    /// Plain-text manual entry for the system prompt
    pub fn manual_entry(&self) -> String {
        let mut out = format!("### {}\n{}\n", self.name, self.description);
        if self.params.is_empty() {
            out.push_str("Parameters: none\n");
            return out;
        }
        out.push_str("Parameters:\n");
        for param in &self.params {
            out.push_str(&format!(
                "- {} ({}, {}): {}",
                param.name,
                param.kind.json_type(),
                if param.required { "required" } else { "optional" },
                param.description
            ));
            if !param.allowed.is_empty() {
                out.push_str(&format!(" One of: {}.", param.allowed.join(", ")));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ToolSpec {
        ToolSpec::new(
            "execute_code",
            "Run code",
            vec![
                ToolParam::optional("language", ParamType::String, "Language").one_of(["python", "shell"]),
                ToolParam::required("code", ParamType::String, "Source"),
            ],
        )
    }

    #[test]
    fn test_openai_schema() {
        let v = sample().to_openai();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "execute_code");
        assert_eq!(v["function"]["parameters"]["required"], json!(["code"]));
        assert_eq!(
            v["function"]["parameters"]["properties"]["language"]["enum"],
            json!(["python", "shell"])
        );
    }

    #[test]
    fn test_anthropic_and_gemini_carry_same_params() {
        let spec = sample();
        let a = spec.to_anthropic();
        let g = spec.to_gemini();
        assert_eq!(a["input_schema"]["properties"]["code"]["type"], "string");
        assert_eq!(g["parameters"]["properties"]["code"]["type"], "STRING");
        assert_eq!(g["parameters"]["type"], "OBJECT");
        assert_eq!(a["input_schema"]["required"], g["parameters"]["required"]);
    }

    #[test]
    fn test_manual_entry_marks_required() {
        let manual = sample().manual_entry();
        assert!(manual.starts_with("### execute_code"));
        assert!(manual.contains("- code (string, required): Source"));
        assert!(manual.contains("One of: python, shell."));
    }
}
