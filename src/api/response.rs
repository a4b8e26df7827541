use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proxy::GatewayReply;

/// Reserved JSON-RPC error codes synthesized by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    RateLimited = -32000,
    PolicyDenied = -32001,
    NoUpstream = -32002,
    UpstreamFailed = -32003,
}

impl ErrorCode {
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Body of a JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorBody {
    pub code: i32,
    pub message: String,
}

/// JSON-RPC 2.0 error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub error: JsonRpcErrorBody,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        JsonRpcErrorResponse {
            jsonrpc: "2.0".to_string(),
            id,
            error: JsonRpcErrorBody {
                code: code.code(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for GatewayReply {
    fn into_response(self) -> Response {
        match self {
            // JSON-RPC errors are protocol-level: always HTTP 200
            GatewayReply::Error(err) => (StatusCode::OK, Json(err)).into_response(),
            GatewayReply::Relay(upstream) => {
                let status =
                    StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    [(header::CONTENT_TYPE, "application/json")],
                    upstream.body,
                )
                    .into_response()
            }
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub policies_loaded: usize,
    pub upstream: Option<String>,
    pub uptime_secs: u64,
}
