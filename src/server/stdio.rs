//! Newline-delimited JSON-RPC over stdio

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::dispatch::ToolDispatcher;
use crate::error::rpc_codes;
use crate::protocol::{
    Implementation, InitializeResult, JsonRpcResponse, RequestId, ServerCapabilities, ToolsCallParams,
    ToolsCapability, ToolsListResult, negotiate_version,
};
use crate::{Error, Result, SERVER_NAME};

/// Reads one request per line and answers each before reading the next
pub struct StdioServer {
    dispatcher: ToolDispatcher,
}

impl StdioServer {
    /// Wrap a dispatcher
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Serve until the reader reaches EOF
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle one raw line; `None` for notifications
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Unparseable request");
                return Some(JsonRpcResponse::error(
                    None,
                    rpc_codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        let (id, method, params) = match parse_request(&value) {
            Ok(parts) => parts,
            Err(response) => return Some(response),
        };

        if is_notification_method(&method) {
            debug!(method = %method, "Notification");
            return None;
        }

        // parse_request guarantees an id for anything that is not a notification
        let id = id?;
        Some(self.handle_request(id, &method, params).await)
    }

    async fn handle_request(&self, id: RequestId, method: &str, params: Option<Value>) -> JsonRpcResponse {
        debug!(id = %id, method, "Request");
        match method {
            "initialize" => Self::initialize(id, params.as_ref()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let result = ToolsListResult {
                    tools: self.dispatcher.list_tools().to_vec(),
                    next_cursor: None,
                };
                to_response(id, &result)
            }
            "tools/call" => self.call_tool(id, params).await,
            _ => JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        }
    }

    fn initialize(id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let version = negotiate_version(requested);
        info!(requested, version, "Client initialized");

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Blogger".to_string()),
            },
            instructions: Some(
                "Read tools work with an API key or OAuth. Creating, updating and deleting \
                 posts requires OAuth; the first write opens a browser for consent."
                    .to_string(),
            ),
        };
        to_response(id, &result)
    }

    async fn call_tool(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolsCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(p)) => p,
            Ok(None) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    "Missing tools/call params",
                );
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    format!("Invalid tools/call params: {e}"),
                );
            }
        };

        match self.dispatcher.invoke(&params.name, params.arguments).await {
            Ok(result) => to_response(id, &result),
            Err(Error::JsonRpc { code, message, data }) => {
                JsonRpcResponse::error_with_data(Some(id), code, message, data)
            }
            Err(e) => JsonRpcResponse::error(Some(id), e.to_rpc_code(), e.to_string()),
        }
    }
}

fn to_response<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            rpc_codes::INTERNAL_ERROR,
            format!("Failed to serialize result: {e}"),
        ),
    }
}

/// Extract a `RequestId` from a JSON value.
///
/// Supports string and integer IDs.
fn extract_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

/// Check whether a method name represents a notification (no response expected).
fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// Parse a JSON-RPC request or notification into `(id, method, params)`
#[allow(clippy::result_large_err)]
fn parse_request(value: &Value) -> std::result::Result<(Option<RequestId>, String, Option<Value>), JsonRpcResponse> {
    let jsonrpc = value.get("jsonrpc").and_then(Value::as_str);
    if jsonrpc != Some("2.0") {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Invalid JSON-RPC version",
        ));
    }

    let id = value.get("id").and_then(extract_request_id);

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcResponse::error(id.clone(), rpc_codes::INVALID_REQUEST, "Missing method"))?;

    let params = value.get("params").cloned();

    if !is_notification_method(method) && id.is_none() {
        return Err(JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "Missing id"));
    }

    Ok((id, method.to_string(), params))
}
