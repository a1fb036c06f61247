//! HTTP Backend Transport
//!
//! Talks to the local backend server:
//! - requests are JSON-RPC 2.0 posted to `{endpoint}/rpc`
//! - server-pushed events arrive on an SSE stream at `{endpoint}/events`

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use super::error::{ChannelError, ChannelResult};
use super::transport::BackendTransport;
use super::types::*;
use crate::compaction::types::CompactConfig;

/// HTTP transport implementation
pub struct HttpTransport {
    /// Client for request/ack calls, bounded by the request timeout
    client: Client,
    /// Client for the long-lived event stream, no overall timeout
    stream_client: Client,
    rpc_url: Url,
    events_url: Url,
    timeout_ms: u64,
    /// Request ID counter for JSON-RPC
    request_id: AtomicU64,
}

impl HttpTransport {
    /// Create a new HTTP transport for a backend base URL
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> ChannelResult<Self> {
        let endpoint_str = endpoint.into();
        let mut base = Url::parse(&endpoint_str)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;

        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;

        Ok(Self {
            client,
            stream_client,
            rpc_url: base.join("rpc")?,
            events_url: base.join("events")?,
            timeout_ms,
            request_id: AtomicU64::new(1),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a JSON-RPC call and decode its result
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> ChannelResult<T> {
        let request = JsonRpcRequest::new(method, params, self.next_request_id());
        debug!("Backend request: {} (id: {})", request.method, request.id);

        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChannelError::ConnectionTimeout(self.timeout_ms)
                } else {
                    ChannelError::from(e)
                }
            })?;

        let response = Self::handle_response(response).await?;
        if response.id != request.id {
            return Err(ChannelError::InvalidResponse(format!(
                "Response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(ChannelError::from)
    }

    /// Call a method whose result payload carries nothing we need
    async fn call_ack(&self, method: &str, params: serde_json::Value) -> ChannelResult<()> {
        let _: serde_json::Value = self.call(method, Some(params)).await?;
        Ok(())
    }

    async fn handle_response(response: Response) -> ChannelResult<JsonRpcResponse> {
        let status = response.status();
        match status {
            StatusCode::OK => {
                let json: JsonRpcResponse = response.json().await?;
                if let Some(ref error) = json.error {
                    Err(ChannelError::rejected(error.code, error.message.clone()))
                } else {
                    Ok(json)
                }
            }
            StatusCode::NOT_FOUND => {
                Err(ChannelError::ConnectionFailed("Endpoint not found".to_string()))
            }
            _ => {
                let error_text = response.text().await.unwrap_or_default();
                Err(ChannelError::TransportError(format!(
                    "HTTP {}: {}",
                    status, error_text
                )))
            }
        }
    }

    /// Follow the backend event stream, forwarding decoded events in arrival
    /// order. Returns when the stream ends or the receiver is dropped.
    pub async fn stream_events(&self, tx: mpsc::UnboundedSender<ServerEvent>) -> ChannelResult<()> {
        info!("Opening backend event stream at {}", self.events_url);

        let response = self
            .stream_client
            .get(self.events_url.clone())
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChannelError::ConnectionFailed(format!(
                "Event stream refused: HTTP {}",
                response.status()
            )));
        }

        forward_events(response.bytes_stream(), &tx).await
    }
}

/// Decode an SSE byte stream into backend events and forward them in
/// arrival order. Frames are decoded only once complete, so multi-byte
/// characters split across chunks arrive intact.
async fn forward_events<S, B, E>(
    bytes: S,
    tx: &mpsc::UnboundedSender<ServerEvent>,
) -> ChannelResult<()>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut events = Box::pin(bytes.eventsource());

    while let Some(next) = events.next().await {
        let sse_event = next.map_err(|e| ChannelError::TransportError(e.to_string()))?;
        if sse_event.data.is_empty() {
            continue;
        }
        match serde_json::from_str::<ServerEvent>(&sse_event.data) {
            Ok(event) => {
                if tx.send(event).is_err() {
                    debug!("Event receiver dropped, closing stream");
                    return Ok(());
                }
            }
            Err(e) => {
                warn!(
                    "Skipping undecodable backend event {:?}: {}",
                    sse_event.event, e
                );
            }
        }
    }

    info!("Backend event stream ended");
    Err(ChannelError::StreamClosed)
}

#[async_trait]
impl BackendTransport for HttpTransport {
    async fn create_session(&self, request: CreateSessionRequest) -> ChannelResult<SessionAck> {
        let params = serde_json::to_value(&request)
            .map_err(|e| ChannelError::SerializationError(e.to_string()))?;
        self.call(methods::CREATE_SESSION, Some(params)).await
    }

    async fn load_session(&self, session_id: &str) -> ChannelResult<SessionHistory> {
        self.call(methods::LOAD_SESSION, Some(json!({ "sessionId": session_id })))
            .await
    }

    async fn close_session(&self, session_id: &str) -> ChannelResult<()> {
        self.call_ack(methods::CLOSE_SESSION, json!({ "sessionId": session_id }))
            .await
    }

    async fn send_message(&self, session_id: &str, content: &str) -> ChannelResult<()> {
        self.call_ack(
            methods::SEND_MESSAGE,
            json!({ "sessionId": session_id, "content": content }),
        )
        .await
    }

    async fn interrupt(&self, session_id: &str) -> ChannelResult<()> {
        self.call_ack(methods::INTERRUPT, json!({ "sessionId": session_id }))
            .await
    }

    async fn get_compact_config(&self, session_id: &str) -> ChannelResult<CompactConfig> {
        self.call(
            methods::GET_COMPACT_CONFIG,
            Some(json!({ "sessionId": session_id })),
        )
        .await
    }

    async fn trigger_compact(&self, session_id: &str) -> ChannelResult<()> {
        self.call_ack(methods::TRIGGER_COMPACT, json!({ "sessionId": session_id }))
            .await
    }

    async fn ping(&self) -> ChannelResult<()> {
        let _: serde_json::Value = self.call(methods::PING, None).await?;
        Ok(())
    }

    fn transport_type(&self) -> &'static str {
        "http"
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("rpc_url", &self.rpc_url)
            .field("events_url", &self.events_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
