//! Session State
//!
//! Records for individual sessions and the messages they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Waiting for the backend to create or resume it
    Pending,
    /// Acknowledged by the backend
    Active,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Outcome of a stop request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum StopState {
    /// Sent; streaming flags were cleared locally
    Requested,
    /// The backend reported the run over
    Confirmed,
    /// The backend rejected the stop request
    Failed(String),
}

/// Type of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    ToolUse,
    ToolResult,
    System,
    Error,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    /// The backend is still appending to this message
    #[serde(default)]
    pub streaming: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a finished message with a fresh id
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            streaming: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }
}

/// Complete state of a single session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Display name
    pub name: Option<String>,
    /// Folder the session works in
    pub working_directory: Option<PathBuf>,
    /// Transcript in insertion order
    pub messages: Vec<Message>,
    /// A run is in progress
    pub streaming: bool,
    pub status: SessionStatus,
    pub token_count: u64,
    pub total_cost: f64,
    /// Last stop request, if any
    pub stop: Option<StopState>,
    /// Last error reported for this session
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a pending session
    pub fn new(id: impl Into<String>, name: Option<String>, working_directory: Option<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name,
            working_directory,
            messages: Vec::new(),
            streaming: false,
            status: SessionStatus::Pending,
            token_count: 0,
            total_cost: 0.0,
            stop: None,
            last_error: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SessionStatus::Pending
    }

    pub fn activate(&mut self) {
        self.status = SessionStatus::Active;
        self.touch();
    }

    /// Insert a message, or replace the one with the same id in place
    pub fn upsert_message(&mut self, message: Message) {
        if message.kind == MessageKind::Assistant || message.streaming {
            self.streaming = message.streaming;
        }
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
        self.touch();
    }

    /// Clear streaming flags on the session and all of its messages
    pub fn end_streaming(&mut self) {
        self.streaming = false;
        for message in self.messages.iter_mut().filter(|m| m.streaming) {
            message.streaming = false;
        }
        self.touch();
    }

    /// A run-ending event arrived; settle an outstanding stop request
    pub fn confirm_stop(&mut self) {
        if self.stop == Some(StopState::Requested) {
            self.stop = Some(StopState::Confirmed);
        }
    }

    /// Label shown on the tab
    pub fn title(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        self.working_directory
            .as_deref()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "new session".to_string())
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
