//! Channel Types - wire structures exchanged with the backend process

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compaction::types::TokenData;
use crate::session::state::Message;

/// Events pushed by the backend for a single session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A message was added, or an existing message (same id) was replaced
    #[serde(rename_all = "camelCase")]
    Message { session_id: String, message: Message },

    /// The backend finished streaming the current turn
    #[serde(rename_all = "camelCase")]
    StreamEnd { session_id: String },

    /// Turn result with usage accounting
    #[serde(rename_all = "camelCase")]
    Result {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_count: Option<u64>,
        #[serde(default)]
        cost: f64,
    },

    /// The run failed on the backend
    #[serde(rename_all = "camelCase")]
    Error { session_id: String, message: String },

    /// Token usage changed
    TokenUpdate(TokenData),

    /// Backend began compacting the session context
    #[serde(rename_all = "camelCase")]
    CompactStart { session_id: String },

    /// Backend finished compacting the session context
    #[serde(rename_all = "camelCase")]
    CompactComplete {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
}

/// Discriminant of [`ServerEvent`], used with a session id as the bus key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Message,
    StreamEnd,
    Result,
    Error,
    TokenUpdate,
    CompactStart,
    CompactComplete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::StreamEnd => "streamEnd",
            Self::Result => "result",
            Self::Error => "error",
            Self::TokenUpdate => "tokenUpdate",
            Self::CompactStart => "compactStart",
            Self::CompactComplete => "compactComplete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ServerEvent {
    /// Get the session ID from any event
    pub fn session_id(&self) -> &str {
        match self {
            Self::Message { session_id, .. } => session_id,
            Self::StreamEnd { session_id } => session_id,
            Self::Result { session_id, .. } => session_id,
            Self::Error { session_id, .. } => session_id,
            Self::TokenUpdate(data) => &data.session_id,
            Self::CompactStart { session_id } => session_id,
            Self::CompactComplete { session_id, .. } => session_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message { .. } => EventKind::Message,
            Self::StreamEnd { .. } => EventKind::StreamEnd,
            Self::Result { .. } => EventKind::Result,
            Self::Error { .. } => EventKind::Error,
            Self::TokenUpdate(_) => EventKind::TokenUpdate,
            Self::CompactStart { .. } => EventKind::CompactStart,
            Self::CompactComplete { .. } => EventKind::CompactComplete,
        }
    }

    /// Whether this event ends an in-flight run
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            Self::StreamEnd { .. } | Self::Result { .. } | Self::Error { .. }
        )
    }
}

/// Parameters for creating a session on the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

/// Backend acknowledgment of a created session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAck {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

/// Stored history returned when resuming a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub session_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub token_count: u64,
    #[serde(default)]
    pub total_cost: f64,
}

/// JSON-RPC request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Option<serde_json::Value>, id: impl Into<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: id.into(),
        }
    }
}

/// JSON-RPC response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Backend RPC method names
pub mod methods {
    pub const CREATE_SESSION: &str = "session/create";
    pub const LOAD_SESSION: &str = "session/load";
    pub const CLOSE_SESSION: &str = "session/close";
    pub const SEND_MESSAGE: &str = "session/send";
    pub const INTERRUPT: &str = "session/interrupt";
    pub const GET_COMPACT_CONFIG: &str = "compact/getConfig";
    pub const TRIGGER_COMPACT: &str = "compact/trigger";
    pub const PING: &str = "ping";
}
