//! JSON-RPC 2.0 server over stdio.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::bridge::{ReqwestTransport, RequestBridge, Transport};
use crate::config::RuntimeConfig;
use crate::error::{RegistryError, RpcError};
use crate::format::ToolOutput;
use crate::registry::{Mode, ToolRegistry};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "treasury-mcp";
/// Upper bound on a single inbound message, in either framing.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// How a message arrived; replies use the same framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    Line,
    ContentLength,
}

pub struct McpServer {
    mode: Mode,
    registry: Arc<ToolRegistry>,
    bridge: RequestBridge,
}

impl McpServer {
    pub fn new(config: &RuntimeConfig) -> Result<Self, RegistryError> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        config: &RuntimeConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            mode: config.mode,
            registry: Arc::new(ToolRegistry::for_mode(config.mode)?),
            bridge: RequestBridge::new(config.resolver(), transport),
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn serve_stdio(&self) -> Result<(), std::io::Error> {
        let reader = BufReader::new(io::stdin());
        let writer = io::stdout();
        self.serve(reader, writer).await
    }

    /// Handle messages until EOF, one at a time.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), std::io::Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            server = MCP_SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            mode = %self.mode,
            tools = self.registry.len(),
            "serving MCP over stdio"
        );

        while let Some((framing, incoming)) = read_message(&mut reader).await? {
            let responses = match incoming {
                Ok(message) => self.handle_incoming_message(message).await,
                Err(err) => vec![error_response(Value::Null, err)],
            };
            for response in responses {
                write_message(&mut writer, &response, framing).await?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::InvalidRequest("Batch request must not be empty".into()),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::InvalidRequest("Request must be a JSON object".into()),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::InvalidRequest("jsonrpc must be '2.0'".into()),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A response to something we never sent.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => Some(match self.handle_request(method, params).await {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            }),
            None => {
                tracing::debug!(method, "notification ignored");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::MethodNotFound(method.to_string())),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": format!(
                "Treasury backend tools ({} mode). Payment credentials, bearer tokens and callback secrets must be passed as tool arguments on every call. Every result is {{url, status, data}}; non-2xx statuses are backend answers, not tool failures.",
                self.mode
            )
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self.registry.descriptors().map(|tool| tool.to_value()).collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::InvalidParams("tools/call params must be an object".into()))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidParams("tools/call requires string field 'name'".into()))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::InvalidParams(
                    "tools/call 'arguments' must be an object".into(),
                ));
            }
        };

        let started = Instant::now();
        let output = match self.registry.invoke(&self.bridge, name, &args).await {
            Ok(output) => {
                tracing::info!(
                    tool = name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool call forwarded"
                );
                output
            }
            Err(err) => {
                if err.is_validation() {
                    tracing::info!(tool = name, field = ?err.field, "tool call rejected: {}", err.message);
                } else {
                    tracing::warn!(tool = name, code = %err.code, "tool call failed: {}", err.message);
                }
                ToolOutput::error(&err.to_value())
            }
        };
        serde_json::to_value(&output).map_err(|e| RpcError::Internal(e.to_string()))
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code(),
            "message": error.to_string()
        }
    })
}

type IncomingMessage = (Framing, Result<Value, RpcError>);

/// Read one message: either a single JSON line or a `Content-Length` framed body.
/// Returns `None` on clean EOF. A frame that cannot be decoded in either framing
/// yields a parse error for that message only; the stream stays usable.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<IncomingMessage>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }

    if !line.to_ascii_lowercase().starts_with("content-length:") {
        let message = if line.len() > MAX_MESSAGE_BYTES {
            Err(too_large(line.len()))
        } else {
            decode(line.trim().as_bytes())
        };
        return Ok(Some((Framing::Line, message)));
    }

    let mut content_length = parse_content_length(&line);
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }
        if header.trim().is_empty() {
            break;
        }
        if header.to_ascii_lowercase().starts_with("content-length:") {
            content_length = parse_content_length(&header);
        }
    }

    let content_length = match content_length {
        Ok(length) => length,
        // Without a usable length the body cannot be skipped; whatever follows
        // is read as the next message.
        Err(err) => return Ok(Some((Framing::ContentLength, Err(err)))),
    };
    if content_length > MAX_MESSAGE_BYTES {
        io::copy(&mut (&mut *reader).take(content_length as u64), &mut io::sink()).await?;
        return Ok(Some((Framing::ContentLength, Err(too_large(content_length)))));
    }

    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some((Framing::ContentLength, decode(&payload))))
}

fn decode(payload: &[u8]) -> Result<Value, RpcError> {
    serde_json::from_slice(payload)
        .map_err(|err| RpcError::Parse(format!("Invalid JSON payload: {err}")))
}

fn too_large(length: usize) -> RpcError {
    RpcError::Parse(format!(
        "Message of {length} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit"
    ))
}

fn parse_content_length(line: &str) -> Result<usize, RpcError> {
    line.split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_default()
        .parse::<usize>()
        .map_err(|_| RpcError::Parse(format!("Invalid Content-Length header: {}", line.trim())))
}

pub async fn write_message<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await
}
