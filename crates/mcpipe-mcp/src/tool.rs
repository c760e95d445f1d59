//! Typed views of `tools/list` and `tools/call` responses.

use crate::error::McpError;
use crate::jsonrpc::JsonRpcResponse;
use serde::Deserialize;

/// Information about a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Result of calling a tool.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl ToolCallOutcome {
    /// All text items joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A content item in a tool result.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Deserialize)]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

/// Extract the tool list from a raw `tools/list` response.
pub fn parse_tool_catalog(response: &serde_json::Value) -> Result<Vec<ToolInfo>, McpError> {
    let result = JsonRpcResponse::from_value(response)?.into_result()?;
    let list: ToolsListResult = serde_json::from_value(result)
        .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;
    Ok(list
        .tools
        .into_iter()
        .map(|t| ToolInfo {
            name: t.name,
            description: t.description.unwrap_or_default(),
            input_schema: t.input_schema,
        })
        .collect())
}

/// Extract the content items from a raw `tools/call` response.
pub fn parse_tool_result(response: &serde_json::Value) -> Result<ToolCallOutcome, McpError> {
    let result = JsonRpcResponse::from_value(response)?.into_result()?;
    let call: ToolCallResult = serde_json::from_value(result)
        .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))?;
    Ok(ToolCallOutcome {
        content: call.content,
        is_error: call.is_error,
    })
}
