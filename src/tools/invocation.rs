//! Tool invocations and their results

use std::collections::BTreeMap;

use serde::Serialize;

use crate::sandbox::SandboxResult;

/// A request from a model to run one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    /// Parameter name to raw string value
    pub arguments: BTreeMap<String, String>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Build an invocation from a provider's native JSON arguments
    ///
    /// Non-string scalars are rendered with their JSON text; nested values
    /// keep their JSON encoding.
    pub fn from_json(name: impl Into<String>, arguments: &serde_json::Value) -> Self {
        let mut args = BTreeMap::new();
        if let Some(object) = arguments.as_object() {
            for (key, value) in object {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => continue,
                    other => other.to_string(),
                };
                args.insert(key.clone(), text);
            }
        }
        Self::new(name, args)
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }
}

/// Outcome of a tool dispatch, as fed back to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
            exit_code: None,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
            exit_code: None,
        }
    }

    /// Convert a sandbox result, keeping its error classification
    pub fn from_sandbox(result: &SandboxResult, timeout_secs: u64) -> Self {
        Self {
            output: result.render(timeout_secs),
            is_error: result.outcome.is_error(),
            exit_code: result.exit_code,
        }
    }
}
