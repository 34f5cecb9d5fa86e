use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: ToolResult) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ToolMeta {
    #[serde(rename = "mcp/www_authenticate", skip_serializing_if = "Option::is_none")]
    pub www_authenticate: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<ToolMeta>,
}

impl ToolResult {
    pub fn success<T: Serialize>(payload: &T) -> Self {
        let structured = serde_json::to_value(payload).ok();
        let summary = structured
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        Self {
            content: vec![ContentBlock {
                kind: "text",
                text: summary,
            }],
            is_error: None,
            structured_content: structured,
            meta: None,
        }
    }

    pub fn error_text(message: String, www_authenticate_challenge: Option<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text",
                text: message,
            }],
            is_error: Some(true),
            structured_content: None,
            meta: www_authenticate_challenge.map(|challenge| ToolMeta {
                www_authenticate: Some(vec![challenge]),
            }),
        }
    }
}
