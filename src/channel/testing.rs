//! Scripted in-memory backend for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::error::{ChannelError, ChannelResult};
use super::transport::BackendTransport;
use super::types::{CreateSessionRequest, SessionAck, SessionHistory};
use crate::compaction::types::CompactConfig;

/// Pauses a call until the test releases it
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

pub struct FakeTransport {
    create_error: Mutex<Option<ChannelError>>,
    create_gate: Mutex<Option<Arc<Gate>>>,
    histories: Mutex<HashMap<String, SessionHistory>>,
    config: Mutex<ChannelResult<CompactConfig>>,
    config_gate: Mutex<Option<Arc<Gate>>>,
    close_gate: Mutex<Option<Arc<Gate>>>,
    trigger_error: Mutex<Option<ChannelError>>,
    interrupt_error: Mutex<Option<ChannelError>>,
    send_error: Mutex<Option<ChannelError>>,
    ping_ok: AtomicBool,
    pings: AtomicUsize,
    pub created: Mutex<Vec<CreateSessionRequest>>,
    pub closed: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub interrupts: Mutex<Vec<String>>,
    pub triggers: Mutex<Vec<String>>,
    pub config_requests: Mutex<Vec<String>>,
}

pub fn default_config() -> CompactConfig {
    CompactConfig {
        enabled: true,
        auto_compact: true,
        threshold: 120_000,
        max_tokens: 200_000,
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            create_error: Mutex::new(None),
            create_gate: Mutex::new(None),
            histories: Mutex::new(HashMap::new()),
            config: Mutex::new(Ok(default_config())),
            config_gate: Mutex::new(None),
            close_gate: Mutex::new(None),
            trigger_error: Mutex::new(None),
            interrupt_error: Mutex::new(None),
            send_error: Mutex::new(None),
            ping_ok: AtomicBool::new(true),
            pings: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            interrupts: Mutex::new(Vec::new()),
            triggers: Mutex::new(Vec::new()),
            config_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_creates(&self, error: ChannelError) {
        *self.create_error.lock() = Some(error);
    }

    pub fn hold_creates(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.create_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn hold_configs(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.config_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn release_configs(&self) {
        self.config_gate.lock().take();
    }

    pub fn hold_closes(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.close_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn release_closes(&self) {
        self.close_gate.lock().take();
    }

    pub fn add_history(&self, history: SessionHistory) {
        self.histories
            .lock()
            .insert(history.session_id.clone(), history);
    }

    pub fn set_config(&self, config: ChannelResult<CompactConfig>) {
        *self.config.lock() = config;
    }

    pub fn fail_triggers(&self, error: ChannelError) {
        *self.trigger_error.lock() = Some(error);
    }

    pub fn fail_interrupts(&self, error: ChannelError) {
        *self.interrupt_error.lock() = Some(error);
    }

    pub fn fail_sends(&self, error: ChannelError) {
        *self.send_error.lock() = Some(error);
    }

    pub fn set_ping_ok(&self, ok: bool) {
        self.ping_ok.store(ok, Ordering::SeqCst);
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

fn outcome(slot: &Mutex<Option<ChannelError>>) -> ChannelResult<()> {
    match slot.lock().clone() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[async_trait]
impl BackendTransport for FakeTransport {
    async fn create_session(&self, request: CreateSessionRequest) -> ChannelResult<SessionAck> {
        self.created.lock().push(request.clone());
        let gate = self.create_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        outcome(&self.create_error)?;
        Ok(SessionAck {
            session_id: request.session_id,
            working_directory: request.working_directory,
        })
    }

    async fn load_session(&self, session_id: &str) -> ChannelResult<SessionHistory> {
        self.histories
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ChannelError::rejected(404, format!("unknown session {}", session_id)))
    }

    async fn close_session(&self, session_id: &str) -> ChannelResult<()> {
        self.closed.lock().push(session_id.to_string());
        let gate = self.close_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        Ok(())
    }

    async fn send_message(&self, session_id: &str, content: &str) -> ChannelResult<()> {
        self.sent
            .lock()
            .push((session_id.to_string(), content.to_string()));
        outcome(&self.send_error)
    }

    async fn interrupt(&self, session_id: &str) -> ChannelResult<()> {
        self.interrupts.lock().push(session_id.to_string());
        outcome(&self.interrupt_error)
    }

    async fn get_compact_config(&self, session_id: &str) -> ChannelResult<CompactConfig> {
        self.config_requests.lock().push(session_id.to_string());
        let gate = self.config_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.config.lock().clone()
    }

    async fn trigger_compact(&self, session_id: &str) -> ChannelResult<()> {
        self.triggers.lock().push(session_id.to_string());
        outcome(&self.trigger_error)
    }

    async fn ping(&self) -> ChannelResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.ping_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChannelError::ConnectionFailed("connection refused".to_string()))
        }
    }

    fn transport_type(&self) -> &'static str {
        "fake"
    }
}
