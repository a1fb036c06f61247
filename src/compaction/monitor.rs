//! Token/Compaction Monitor
//!
//! Tracks token usage and the `idle -> compacting -> idle` cycle for the
//! current session. Transitions happen only on backend events; crossing the
//! warning threshold changes the display, never the phase.

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;

use super::types::{CompactConfig, CompactPhase, ManualCompact, TokenData};
use crate::channel::{BackendTransport, EventBus, EventKind, ServerEvent, Subscription};

/// Kinds the monitor listens to for the active session
const MONITORED_KINDS: [EventKind; 3] = [
    EventKind::TokenUpdate,
    EventKind::CompactStart,
    EventKind::CompactComplete,
];

/// Progress of the per-activation config fetch
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigState {
    Loading,
    Loaded(CompactConfig),
    Unavailable(String),
}

#[derive(Debug)]
struct MonitorState {
    session_id: Option<String>,
    /// Bumped on every activation; stale config responses compare against it
    generation: u64,
    config: ConfigState,
    phase: CompactPhase,
    token: Option<TokenData>,
    manual: Option<ManualCompact>,
    last_summary: Option<String>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            session_id: None,
            generation: 0,
            config: ConfigState::Loading,
            phase: CompactPhase::Idle,
            token: None,
            manual: None,
            last_summary: None,
        }
    }

    fn reset(&mut self, session_id: Option<String>) -> u64 {
        self.session_id = session_id;
        self.generation += 1;
        self.config = ConfigState::Loading;
        self.phase = CompactPhase::Idle;
        self.token = None;
        self.manual = None;
        self.last_summary = None;
        self.generation
    }

    /// Apply an event for the tracked session. Events for any other session
    /// are rejected.
    fn apply(&mut self, event: &ServerEvent) -> bool {
        if self.session_id.as_deref() != Some(event.session_id()) {
            debug!(
                "Monitor ignoring {} for inactive session {}",
                event.kind(),
                event.session_id()
            );
            return false;
        }

        match event {
            ServerEvent::TokenUpdate(data) => {
                self.token = Some(data.clone());
            }
            ServerEvent::CompactStart { session_id } => {
                info!("Compaction started for session {}", session_id);
                self.phase = CompactPhase::Compacting;
                if self.manual == Some(ManualCompact::Requested) {
                    self.manual = Some(ManualCompact::Confirmed);
                }
            }
            ServerEvent::CompactComplete { session_id, summary } => {
                if self.phase == CompactPhase::Compacting {
                    info!("Compaction finished for session {}", session_id);
                }
                self.phase = CompactPhase::Idle;
                self.manual = None;
                self.last_summary = summary.clone();
            }
            _ => return false,
        }
        true
    }
}

/// What the compaction indicator should show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MonitorView {
    Hidden,
    Visible(CompactStatus),
}

/// Displayable compaction state for the current session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactStatus {
    pub session_id: String,
    pub config: CompactConfig,
    pub phase: CompactPhase,
    pub token: Option<TokenData>,
    /// Usage is at or past the configured threshold
    pub warning: bool,
    pub manual: Option<ManualCompact>,
    pub last_summary: Option<String>,
}

/// Token/Compaction Monitor
pub struct TokenMonitor {
    bus: EventBus,
    transport: Arc<dyn BackendTransport>,
    state: Arc<RwLock<MonitorState>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl TokenMonitor {
    pub fn new(bus: EventBus, transport: Arc<dyn BackendTransport>) -> Self {
        Self {
            bus,
            transport,
            state: Arc::new(RwLock::new(MonitorState::new())),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Track a session: drop the previous session's subscriptions, subscribe
    /// for this one, then fetch its config. Nothing is shown until the fetch
    /// resolves.
    pub async fn activate(&self, session_id: &str) {
        let generation = {
            let mut subscriptions = self.subscriptions.lock();
            subscriptions.clear();

            let generation = self.state.write().reset(Some(session_id.to_string()));
            subscriptions.extend(
                MONITORED_KINDS
                    .iter()
                    .map(|kind| self.subscribe(*kind, session_id)),
            );
            generation
        };
        debug!("Monitor tracking session {}", session_id);

        self.load_config(session_id, generation).await;
    }

    /// Stop tracking any session
    pub fn deactivate(&self) {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.clear();
        self.state.write().reset(None);
    }

    fn subscribe(&self, kind: EventKind, session_id: &str) -> Subscription {
        let state = self.state.clone();
        self.bus.subscribe(kind, session_id, move |event| {
            state.write().apply(event);
        })
    }

    async fn load_config(&self, session_id: &str, generation: u64) {
        let result = self.transport.get_compact_config(session_id).await;

        let mut state = self.state.write();
        if state.generation != generation {
            debug!("Dropping stale compaction config for session {}", session_id);
            return;
        }
        state.config = match result {
            Ok(config) => ConfigState::Loaded(config),
            Err(e) => {
                warn!("Compaction config unavailable for session {}: {}", session_id, e);
                ConfigState::Unavailable(e.to_string())
            }
        };
    }

    /// Ask the backend to compact now. The phase only changes when the
    /// backend's start event arrives.
    pub async fn trigger_manual_compact(&self) -> MonitorResult<()> {
        let (session_id, generation) = {
            let mut state = self.state.write();
            let session_id = state.session_id.clone().ok_or(MonitorError::NoActiveSession)?;
            match &state.config {
                ConfigState::Loaded(config) if config.enabled => {}
                _ => return Err(MonitorError::Unavailable(session_id)),
            }
            state.manual = Some(ManualCompact::Requested);
            (session_id, state.generation)
        };
        info!("Manual compaction requested for session {}", session_id);

        if let Err(e) = self.transport.trigger_compact(&session_id).await {
            warn!("Manual compaction rejected for session {}: {}", session_id, e);
            let mut state = self.state.write();
            if state.generation == generation && state.manual == Some(ManualCompact::Requested) {
                state.manual = Some(ManualCompact::Failed(e.to_string()));
            }
            return Err(MonitorError::TriggerFailed(e.to_string()));
        }
        Ok(())
    }

    /// Current display state
    pub fn view(&self) -> MonitorView {
        let state = self.state.read();
        let (Some(session_id), ConfigState::Loaded(config)) = (&state.session_id, &state.config) else {
            return MonitorView::Hidden;
        };
        if !config.enabled {
            return MonitorView::Hidden;
        }

        let warning = state
            .token
            .as_ref()
            .map(|t| config.threshold > 0 && t.current >= config.threshold)
            .unwrap_or(false);

        MonitorView::Visible(CompactStatus {
            session_id: session_id.clone(),
            config: config.clone(),
            phase: state.phase,
            token: state.token.clone(),
            warning,
            manual: state.manual.clone(),
            last_summary: state.last_summary.clone(),
        })
    }

    pub fn phase(&self) -> CompactPhase {
        self.state.read().phase
    }

    pub fn config_state(&self) -> ConfigState {
        self.state.read().config.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.read().session_id.clone()
    }
}

/// Monitor errors
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("No active session")]
    NoActiveSession,

    #[error("Compaction unavailable for session {0}")]
    Unavailable(String),

    #[error("Compaction request failed: {0}")]
    TriggerFailed(String),
}

/// Result type alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
