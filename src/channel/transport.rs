//! Backend Transport Abstraction
//!
//! Request/acknowledgment calls to the backend process. Every call resolves
//! exactly once with a value or an error; server-pushed events travel
//! separately through the event bus.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ChannelResult;
use super::types::{CreateSessionRequest, SessionAck, SessionHistory};
use crate::compaction::types::CompactConfig;

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    #[serde(rename = "http")]
    Http {
        endpoint: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

/// Backend transport trait - the request side of the event channel
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Ask the backend to create a session
    async fn create_session(&self, request: CreateSessionRequest) -> ChannelResult<SessionAck>;

    /// Fetch a stored session with its message history
    async fn load_session(&self, session_id: &str) -> ChannelResult<SessionHistory>;

    /// Release backend resources held for a session
    async fn close_session(&self, session_id: &str) -> ChannelResult<()>;

    /// Send a user message into a session
    async fn send_message(&self, session_id: &str, content: &str) -> ChannelResult<()>;

    /// Ask the backend to stop the running turn
    async fn interrupt(&self, session_id: &str) -> ChannelResult<()>;

    /// Fetch compaction settings for a session
    async fn get_compact_config(&self, session_id: &str) -> ChannelResult<CompactConfig>;

    /// Request compaction; the backend answers with events if it starts
    async fn trigger_compact(&self, session_id: &str) -> ChannelResult<()>;

    /// Liveness probe
    async fn ping(&self) -> ChannelResult<()>;

    /// Get transport type name
    fn transport_type(&self) -> &'static str;
}

/// Transport factory for creating transports from configuration
pub struct TransportFactory;

impl TransportFactory {
    /// Create a transport from configuration
    pub fn create(config: TransportConfig) -> ChannelResult<Arc<dyn BackendTransport>> {
        match config {
            TransportConfig::Http { endpoint, timeout_ms } => {
                use super::http::HttpTransport;
                let transport = HttpTransport::new(endpoint, timeout_ms.unwrap_or(30000))?;
                Ok(Arc::new(transport))
            }
        }
    }
}
