// MCP server: newline-delimited JSON-RPC over stdio

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "nowbridge";

/// Longest JSON-RPC message accepted on one line, in bytes.
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

pub struct McpServer {
    registry: ToolRegistry,
    package: Option<String>,
    max_line_length: usize,
}

impl McpServer {
    /// `package` narrows `tools/list`; `None` lists every tool.
    pub fn new(registry: ToolRegistry, package: Option<String>) -> Self {
        Self {
            registry,
            package,
            max_line_length: MAX_LINE_LENGTH,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Read one JSON-RPC message per line and write one response per
    /// request. Notifications get no response. A line longer than the
    /// maximum is answered with a parse error and ends the session.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(
            reader,
            LinesCodec::new_with_max_length(self.max_line_length),
        );
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        info!(tools = self.registry.len(), "MCP server listening on stdio");

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(max_bytes = self.max_line_length, "Message exceeds maximum line length");
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::parse_error(format!(
                            "message exceeds {} bytes",
                            self.max_line_length
                        )),
                    );
                    let payload =
                        serde_json::to_string(&response).context("Failed to serialize response")?;
                    sink.send(payload).await.context("Failed to write to stdout")?;
                    return Err(anyhow!(
                        "Message exceeds maximum line length of {} bytes",
                        self.max_line_length
                    ));
                }
                Err(e) => return Err(e).context("Failed to read from stdin"),
            };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line).await {
                let payload =
                    serde_json::to_string(&response).context("Failed to serialize response")?;
                sink.send(payload).await.context("Failed to write to stdout")?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one raw line.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Malformed JSON-RPC message");
                return Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(e)));
            }
        };

        let id = value.get("id").cloned();
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => id.map(|id| {
                JsonRpcResponse::error(id, JsonRpcError::invalid_request(e.to_string()))
            }),
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "Handling request");

        let Some(id) = request.id else {
            // Notifications (e.g. notifications/initialized) need no reply
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => respond(initialize_result()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => respond(ListToolsResult {
                tools: self.registry.list_tools(self.package.as_deref()),
            }),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))?;

        let result = match self.registry.call_tool(&params.name, params.arguments).await {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => CallToolResult::text(text),
                Err(e) => return Err(JsonRpcError::internal_error(e.to_string())),
            },
            Err(e) => {
                warn!(tool = %params.name, kind = %e.kind(), error = %e.message(), "Tool call failed");
                CallToolResult::error(format!("Error [{}]: {}", e.kind(), e.message()))
            }
        };
        respond(result)
    }
}

fn initialize_result() -> InitializeResult {
    InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    }
}

fn respond<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
