use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decision-time view of one tool invocation.
///
/// Arguments are kept exactly as received on the wire. The policy engine
/// only ever inspects string-valued entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool being invoked
    pub tool_name: String,

    /// Calling agent; empty for anonymous callers
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_id: String,

    /// Tool arguments
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a call for a tool with no agent and no arguments.
    pub fn new(tool_name: impl Into<String>) -> Self {
        ToolCall {
            tool_name: tool_name.into(),
            agent_id: String::new(),
            arguments: Map::new(),
        }
    }

    /// Set the calling agent.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Add a single argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Build a call from JSON-RPC `tools/call` params.
    ///
    /// A missing or non-string `name` yields an empty tool name, and a
    /// missing or non-object `arguments` yields no arguments.
    pub fn from_params(params: Option<&Value>, agent_id: impl Into<String>) -> Self {
        let tool_name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let arguments = params
            .and_then(|p| p.get("arguments"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        ToolCall {
            tool_name,
            agent_id: agent_id.into(),
            arguments,
        }
    }

    /// Get a string argument, if present and a string.
    #[inline]
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Number of top-level arguments.
    #[inline]
    pub fn arg_count(&self) -> usize {
        self.arguments.len()
    }

    /// Returns true if no agent identity was supplied.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.agent_id.is_empty()
    }

    /// Key used for per-agent, per-tool rate limiting.
    pub fn rate_limit_key(&self) -> String {
        format!("{}:{}", self.agent_id, self.tool_name)
    }
}
