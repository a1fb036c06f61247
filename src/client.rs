//! Client core
//!
//! Owns the registry, the compaction monitor and the event bus for one
//! workspace. Construct one at startup and call `reset` on logout or
//! workspace switch; consumers hold it explicitly rather than through a
//! global.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{BackendTransport, EventBus, LivenessGuard, LivenessMonitor, ServerEvent};
use crate::compaction::{MonitorError, MonitorView, TokenMonitor};
use crate::config::ClientConfig;
use crate::projects::{display_name, ProjectsError, RecentProject, RecentProjects};
use crate::session::{SessionError, SessionRegistry};
use crate::tabs::{self, Tab, TabAction};

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Projects(#[from] ProjectsError),

    #[error("No session is open")]
    NoCurrentSession,
}

pub type ClientResult<T> = Result<T, ClientError>;

pub struct Client {
    bus: EventBus,
    registry: Arc<SessionRegistry>,
    monitor: Arc<TokenMonitor>,
    liveness: LivenessMonitor,
    projects: Mutex<RecentProjects>,
}

impl Client {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn BackendTransport>,
        projects: RecentProjects,
    ) -> Self {
        let bus = EventBus::new();
        info!("Client core using {} transport", transport.transport_type());

        Self {
            registry: Arc::new(SessionRegistry::new(transport.clone())),
            monitor: Arc::new(TokenMonitor::new(bus.clone(), transport.clone())),
            liveness: LivenessMonitor::new(
                transport,
                config.health_interval(),
                config.unreachable_threshold,
            ),
            projects: Mutex::new(projects),
            bus,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn monitor(&self) -> &TokenMonitor {
        &self.monitor
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Route one pushed event: fold it into the registry, then fan it out
    pub fn dispatch(&self, event: &ServerEvent) {
        self.registry.apply_event(event);
        let delivered = self.bus.publish(event);
        debug!(
            "Dispatched {} for {} to {} handlers",
            event.kind(),
            event.session_id(),
            delivered
        );
    }

    /// Drain pushed events in arrival order until the sender side closes
    pub fn spawn_event_pump(
        self: &Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                client.dispatch(&event);
            }
            debug!("Event pump stopped");
        })
    }

    /// Start advisory backend liveness probing
    pub fn start_liveness(&self) -> LivenessGuard {
        self.liveness.start()
    }

    /// Keep the monitor pointed at the registry's current session
    async fn sync_monitor(&self) {
        let current = self.registry.current_id();
        if current == self.monitor.session_id() {
            return;
        }
        match current {
            Some(session_id) => self.monitor.activate(&session_id).await,
            None => self.monitor.deactivate(),
        }
    }

    /// Open an empty session
    pub async fn new_session(&self) -> ClientResult<String> {
        let result = self.registry.create_session(None, None).await;
        self.sync_monitor().await;
        Ok(result?)
    }

    /// Open a session in a folder and remember the folder
    pub async fn open_folder(&self, path: &Path) -> ClientResult<String> {
        let name = display_name(path);
        let result = self
            .registry
            .create_session(Some(name.clone()), Some(path.to_path_buf()))
            .await;
        self.sync_monitor().await;
        let session_id = result?;

        if let Err(e) = self.projects.lock().add(path, Some(name)) {
            warn!("Could not record recent project {:?}: {}", path, e);
        }
        Ok(session_id)
    }

    /// Switch tabs, loading the session from the backend if needed
    pub async fn switch_to(&self, session_id: &str) -> ClientResult<()> {
        let result = self.registry.resume_session(session_id).await;
        self.sync_monitor().await;
        Ok(result?)
    }

    /// Run a tab close action
    pub async fn close_tabs(&self, action: TabAction) -> usize {
        let closed = tabs::apply(&self.registry, &action).await;
        self.sync_monitor().await;
        closed
    }

    /// Send a message to the current session
    pub async fn send(&self, content: &str) -> ClientResult<()> {
        let session_id = self.current_session_id()?;
        Ok(self.registry.send_message(&session_id, content).await?)
    }

    /// Stop the current session's run
    pub async fn stop(&self) -> ClientResult<()> {
        let session_id = self.current_session_id()?;
        Ok(self.registry.stop_session(&session_id).await?)
    }

    /// Request compaction of the current session
    pub async fn compact_now(&self) -> ClientResult<()> {
        Ok(self.monitor.trigger_manual_compact().await?)
    }

    /// Drop all sessions; used on logout or workspace switch
    pub async fn reset(&self) {
        let removed = self.registry.delete_all_sessions().await;
        self.monitor.deactivate();
        info!("Client reset, {} sessions closed", removed);
    }

    pub fn tabs(&self) -> Vec<Tab> {
        tabs::tabs(&self.registry)
    }

    pub fn compaction_view(&self) -> MonitorView {
        self.monitor.view()
    }

    pub fn recent_projects(&self) -> Vec<RecentProject> {
        self.projects.lock().entries().to_vec()
    }

    fn current_session_id(&self) -> ClientResult<String> {
        self.registry
            .current_id()
            .ok_or(ClientError::NoCurrentSession)
    }
}
