//! Error types for the Blogger MCP server

use std::io;

use serde_json::{Value, json};
use thiserror::Error;

/// Result type alias for the Blogger MCP server
pub type Result<T> = std::result::Result<T, Error>;

/// Blogger MCP errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No applicable credential exists or can be produced
    #[error("Authentication unavailable: {0}")]
    AuthUnavailable(String),

    /// Consent denied, code exchange failed, or the flow timed out
    #[error("OAuth flow failed: {0}")]
    AuthFlowFailed(String),

    /// The Blogger API rejected or errored on a call
    #[error("{message}")]
    RemoteOperationFailed {
        /// HTTP status returned by the API, if a response was received
        status: Option<u16>,
        /// Error message reported by the API
        message: String,
        /// Diagnostic fragment (error reasons) from the API error body
        detail: Option<String>,
    },

    /// Malformed tool invocation (missing or invalid arguments)
    #[error("{0}")]
    InvalidInvocation(String),

    /// Unknown tool name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::InvalidInvocation(_) => rpc_codes::INVALID_PARAMS,
            Self::UnknownTool(_) => rpc_codes::METHOD_NOT_FOUND,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Diagnostic detail attached to a remote failure, if any
    #[must_use]
    pub fn remote_detail(&self) -> Option<&str> {
        match self {
            Self::RemoteOperationFailed { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Normalize a handler failure into the uniform outward `InternalError`.
    ///
    /// The message keeps the original error text; a remote detail fragment is
    /// appended and also carried in `data.detail`.
    #[must_use]
    pub fn into_tool_failure(self) -> Self {
        let detail = self.remote_detail().map(ToString::to_string);
        let mut message = format!("Tool execution failed: {self}");
        if let Some(ref d) = detail {
            message.push_str(" (details: ");
            message.push_str(d);
            message.push(')');
        }
        Self::JsonRpc {
            code: rpc_codes::INTERNAL_ERROR,
            message,
            data: detail.map(|d| json!({ "detail": d })),
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
}
