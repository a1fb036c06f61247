//! Registry Events
//!
//! Change notifications emitted by the session registry so views can
//! re-render.

use serde::{Deserialize, Serialize};

/// Events that can be emitted by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryEvent {
    /// A pending session was added to the end of the tab order
    #[serde(rename_all = "camelCase")]
    Created { session_id: String },

    /// The backend acknowledged a pending session
    #[serde(rename_all = "camelCase")]
    Activated { session_id: String },

    /// Creation was rejected and the pending session rolled back
    #[serde(rename_all = "camelCase")]
    CreationFailed { session_id: String, error: String },

    /// A session was removed
    #[serde(rename_all = "camelCase")]
    Deleted { session_id: String },

    /// Session content changed (messages, streaming, usage)
    #[serde(rename_all = "camelCase")]
    Updated { session_id: String },

    /// The current session pointer moved
    #[serde(rename_all = "camelCase")]
    CurrentChanged { session_id: Option<String> },

    /// All sessions were removed
    Cleared,
}

impl RegistryEvent {
    /// Session this event is about, if any
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Created { session_id }
            | Self::Activated { session_id }
            | Self::CreationFailed { session_id, .. }
            | Self::Deleted { session_id }
            | Self::Updated { session_id } => Some(session_id),
            Self::CurrentChanged { session_id } => session_id.as_deref(),
            Self::Cleared => None,
        }
    }
}
