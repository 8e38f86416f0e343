use serde_json::{Value, json};
use thiserror::Error;

/// No base URL could be determined for a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "no base URL configured for environment '{environment}'; set TREASURY_API_URL or TREASURY_DEFAULT_BASE_URL"
    )]
    NoBaseUrl { environment: String },
}

/// Failure of the outbound call itself. HTTP error statuses are not transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to reach backend at {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
}

/// Protocol-level failure, answered in the JSON-RPC `error` member.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("{0}")]
    InvalidParams(String),
    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::Parse(_) => -32700,
            RpcError::InvalidRequest(_) => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::Internal(_) => -32603,
        }
    }
}

/// Error surfaced to the calling agent as an `isError` tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
    pub docs_hint: Option<String>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::new("validation_failed", message).with_field(field)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }

    pub fn is_validation(&self) -> bool {
        self.code == "validation_failed"
    }

    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        if let Some(docs_hint) = &self.docs_hint {
            payload["docs_hint"] = Value::String(docs_hint.clone());
        }
        payload
    }
}

impl From<BridgeError> for ToolError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Config(err) => ToolError::new("configuration_error", err.to_string())
                .with_docs_hint(
                    "Set TREASURY_API_URL, TREASURY_DEFAULT_BASE_URL, or pass a known environment.",
                ),
            BridgeError::Transport(err) => ToolError::new("transport_error", err.to_string())
                .with_docs_hint("Ensure the treasury backend is reachable from this host."),
        }
    }
}
