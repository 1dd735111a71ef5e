use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution path chosen for a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Tool,
    Generated,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Tool => "tool",
            ExecutionMode::Generated => "generated",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "tool" => Some(ExecutionMode::Tool),
            "generated" => Some(ExecutionMode::Generated),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool advertised by the Tool Port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the parameters object.
    pub parameters: Value,
}

/// A structured tool invocation produced by the Reasoning Port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Uniform result envelope for both execution paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub mode: ExecutionMode,
    pub payload: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    /// The invocation that produced this result, on the tool path.
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
}

impl ExecutionResult {
    pub fn succeeded(mode: ExecutionMode, payload: impl Into<String>) -> Self {
        Self {
            mode,
            payload: Some(payload.into()),
            success: true,
            error: None,
            tool_call: None,
        }
    }

    pub fn failed(mode: ExecutionMode, error: impl Into<String>) -> Self {
        Self {
            mode,
            payload: None,
            success: false,
            error: Some(error.into()),
            tool_call: None,
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_call = Some(call);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_is_strict() {
        assert_eq!(ExecutionMode::parse_str("tool"), Some(ExecutionMode::Tool));
        assert_eq!(ExecutionMode::parse_str("generated"), Some(ExecutionMode::Generated));
        assert_eq!(ExecutionMode::parse_str("generate"), None);
        assert_eq!(ExecutionMode::parse_str("Tool"), None);
    }

    #[test]
    fn failed_result_carries_error() {
        let r = ExecutionResult::failed(ExecutionMode::Tool, "unknown tool `frob`");
        assert!(!r.success);
        assert!(r.payload.is_none());
        assert_eq!(r.error.as_deref(), Some("unknown tool `frob`"));
    }

    #[test]
    fn tool_call_parameters_default_to_empty() {
        let call: ToolCall = serde_json::from_str(r#"{"tool": "list_directory"}"#).unwrap();
        assert_eq!(call.tool, "list_directory");
        assert!(call.parameters.is_empty());
    }
}
