//! JSON-RPC 2.0 message types for MCP communication.

use crate::error::McpError;
use serde::{Deserialize, Serialize};

/// A JSON-RPC 2.0 request. Always carries an `id` and expects a reply.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification.
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// Typed view of a JSON-RPC 2.0 response.
///
/// The session hands back the raw `serde_json::Value` it read; this type is
/// for callers that want to branch on `result` versus `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Interpret a raw message as a response.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, McpError> {
        Self::deserialize(value)
            .map_err(|e| McpError::Protocol(format!("Malformed JSON-RPC response: {e}")))
    }

    /// The `result` payload, or the server's `error` as [`McpError::JsonRpc`].
    pub fn into_result(self) -> Result<serde_json::Value, McpError> {
        if let Some(err) = self.error {
            return Err(McpError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or_else(|| {
            McpError::Protocol("Response has neither result nor error".to_string())
        })
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Hands out request ids: 1, 2, 3, ...
///
/// Only one request is ever outstanding, but ids are never reused so a stray
/// late reply cannot be mistaken for the answer to a later call.
#[derive(Debug)]
pub struct RequestIds {
    next: u64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next request will get, without consuming it.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_request_with_params() {
        let req = JsonRpcRequest::new(
            3,
            "tools/call",
            Some(serde_json::json!({"name": "get_alerts", "arguments": {"state": "TX"}})),
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 3);
        assert_eq!(json["method"], "tools/call");
        assert_eq!(json["params"]["arguments"]["state"], "TX");
    }

    #[test]
    fn serialize_request_without_params() {
        let req = JsonRpcRequest::new(2, "tools/list", None);
        let text = serde_json::to_string(&req).unwrap();
        assert_eq!(text, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
    }

    #[test]
    fn serialize_notification_has_no_id() {
        let notif = JsonRpcNotification::new("notifications/initialized", None);
        let text = serde_json::to_string(&notif).unwrap();
        assert_eq!(
            text,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#
        );
    }

    #[test]
    fn response_with_result() {
        let value = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}});
        let resp = JsonRpcResponse::from_value(&value).unwrap();
        assert_eq!(resp.id, Some(serde_json::json!(1)));
        assert_eq!(resp.into_result().unwrap(), serde_json::json!({"tools": []}));
    }

    #[test]
    fn response_with_error_becomes_json_rpc_error() {
        let value = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        });
        let resp = JsonRpcResponse::from_value(&value).unwrap();
        match resp.into_result() {
            Err(McpError::JsonRpc { code, message }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("Expected JsonRpc error, got: {other:?}"),
        }
    }

    #[test]
    fn response_with_error_data() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid","data":"extra info"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.error.unwrap().data.unwrap(), "extra info");
    }

    #[test]
    fn response_with_neither_result_nor_error() {
        let value = serde_json::json!({"jsonrpc": "2.0", "id": 7});
        let resp = JsonRpcResponse::from_value(&value).unwrap();
        assert!(matches!(resp.into_result(), Err(McpError::Protocol(_))));
    }

    #[test]
    fn non_object_is_not_a_response() {
        let value = serde_json::json!([1, 2, 3]);
        assert!(matches!(
            JsonRpcResponse::from_value(&value),
            Err(McpError::Protocol(_))
        ));
    }

    #[test]
    fn request_ids_are_monotonic_from_one() {
        let mut ids = RequestIds::new();
        assert_eq!(ids.peek(), 1);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
        assert_eq!(ids.peek(), 4);
    }
}
