//! MCP server dispatch
//!
//! Decodes one JSON-RPC message, routes it to the matching method and encodes
//! the reply. Malformed input never escapes as an HTTP failure: it is answered
//! with a JSON-RPC error object, as the protocol requires.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::protocol::{
    InitializeResult, McpError, McpMethod, McpRequest, McpResponse, ServerInfo, ToolCallParams,
    JSONRPC_VERSION, PROTOCOL_VERSION,
};
use super::tools;
use crate::app::Kick;
use crate::auth::scopes;
use crate::server::ApiError;

const SERVER_NAME: &str = "Kick";

const INSTRUCTIONS: &str = "Kick provides secure introspection and control for a running \
application.\n\n\
Available capabilities:\n\
- Health Checks: storage and dependency connectivity\n\
- System Stats: CPU, memory, disk usage and uptime (container-aware)\n\
- Log Management: list and read log files with filtering\n\
- Queue Management: monitor queue depths, view failed jobs, retry jobs\n\
- Commands: list and execute whitelisted commands";

/// `POST /mcp/{prefix}`; requires a token holding the `*` scope
pub async fn handle_http(
    State(kick): State<Arc<Kick>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if let Err(e) = kick.authorize(header, scopes::WILDCARD) {
        return ApiError::from(e).into_response();
    }

    match handle_message(&kick, &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Handle one raw JSON-RPC message.
///
/// # Returns
///
/// The response to send, or `None` for a notification.
pub async fn handle_message(kick: &Kick, body: &[u8]) -> Option<McpResponse> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            return Some(McpResponse::err(
                Value::Null,
                McpError::parse_error(format!("Parse error: {}", e)),
            ))
        }
    };

    if value.is_array() {
        return Some(McpResponse::err(
            Value::Null,
            McpError::invalid_request("Batch requests are not supported"),
        ));
    }

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: McpRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Some(McpResponse::err(
                id,
                McpError::invalid_request(format!("Invalid request: {}", e)),
            ))
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(McpResponse::err(
            id,
            McpError::invalid_request(format!("Unsupported jsonrpc version: {}", request.jsonrpc)),
        ));
    }

    let Some(id) = request.id else {
        debug!(method = %request.method, "Received MCP notification");
        return None;
    };

    let response = match dispatch(kick, &request.method, request.params).await {
        Ok(result) => McpResponse::ok(id, result),
        Err(error) => {
            warn!(method = %request.method, code = error.code, "MCP request failed: {}", error.message);
            McpResponse::err(id, error)
        }
    };
    Some(response)
}

async fn dispatch(kick: &Kick, method: &str, params: Option<Value>) -> Result<Value, McpError> {
    match McpMethod::from(method) {
        McpMethod::Initialize => {
            let result = InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({ "tools": { "listChanged": false } }),
                server_info: ServerInfo {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                instructions: Some(INSTRUCTIONS.to_string()),
            };
            to_value(&result)
        }
        McpMethod::Ping => Ok(json!({})),
        McpMethod::ToolsList => Ok(json!({ "tools": tools::definitions() })),
        McpMethod::ToolsCall => {
            let params: ToolCallParams = params
                .ok_or_else(|| McpError::invalid_params("Missing tool call parameters"))
                .and_then(|p| {
                    serde_json::from_value(p)
                        .map_err(|e| McpError::invalid_params(format!("Invalid tool call: {}", e)))
                })?;

            let result = tools::call(kick, &params.name, &params.arguments).await?;
            to_value(&result)
        }
        McpMethod::Initialized | McpMethod::Other(_) => Err(McpError::method_not_found(method)),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string()))
}
