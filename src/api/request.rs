use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ToolCall;

/// JSON-RPC method that invokes a tool.
pub const TOOLS_CALL_METHOD: &str = "tools/call";

/// Header carrying the calling agent's identity.
pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// Maximum accepted request body (1 MiB).
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// Minimal JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, normally "2.0"
    #[serde(default)]
    pub jsonrpc: String,

    /// Method name
    #[serde(default)]
    pub method: String,

    /// Request id, echoed in synthesized errors (`null` if absent)
    #[serde(default)]
    pub id: Value,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Returns true if this request invokes a tool.
    #[inline]
    pub fn is_tool_call(&self) -> bool {
        self.method == TOOLS_CALL_METHOD
    }

    /// Convert to a ToolCall for policy evaluation.
    pub fn to_tool_call(&self, agent_id: &str) -> ToolCall {
        ToolCall::from_params(self.params.as_ref(), agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": "abc-1",
            "params": {"name": "read_file", "arguments": {"path": "/tmp/test"}}
        }"#;

        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();

        assert!(req.is_tool_call());
        assert_eq!(req.id, Value::from("abc-1"));

        let call = req.to_tool_call("agent-1");
        assert_eq!(call.tool_name, "read_file");
        assert_eq!(call.str_arg("path"), Some("/tmp/test"));
        assert_eq!(call.agent_id, "agent-1");
    }

    #[test]
    fn test_other_methods_and_missing_fields() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"resources/list"}"#).unwrap();

        assert!(!req.is_tool_call());
        assert!(req.id.is_null());
        assert!(req.params.is_none());
    }

    #[test]
    fn test_non_object_body_rejected() {
        assert!(serde_json::from_str::<JsonRpcRequest>("[1, 2, 3]").is_err());
        assert!(serde_json::from_str::<JsonRpcRequest>("not json").is_err());
    }
}
