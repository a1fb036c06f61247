//! Session Registry
//!
//! Owns the ordered list of sessions and the current-session pointer. It is
//! the only place sessions are created or removed.
//!
//! Backend calls are made without holding the registry lock, so every
//! deferred update re-checks that its session still exists before applying.

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::events::RegistryEvent;
use super::state::{Message, MessageKind, Session, StopState};
use crate::channel::{BackendTransport, CreateSessionRequest, ServerEvent};

#[derive(Default)]
struct RegistryInner {
    /// Tab order is insertion order
    sessions: Vec<Session>,
    /// Always `None` or the id of an entry in `sessions`
    current: Option<String>,
}

impl RegistryInner {
    fn find_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }

    fn contains(&self, session_id: &str) -> bool {
        self.sessions.iter().any(|s| s.id == session_id)
    }

    /// Remove a session; if it was current, fall back to its left neighbour.
    /// Returns the removed session and whether the current pointer moved.
    fn remove(&mut self, session_id: &str) -> Option<(Session, bool)> {
        let index = self.sessions.iter().position(|s| s.id == session_id)?;
        let removed = self.sessions.remove(index);

        let was_current = self.current.as_deref() == Some(session_id);
        if was_current {
            self.current = index
                .checked_sub(1)
                .map(|left| self.sessions[left].id.clone());
        }
        Some((removed, was_current))
    }
}

/// Session Registry
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    transport: Arc<dyn BackendTransport>,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl SessionRegistry {
    /// Create an empty registry bound to a backend
    pub fn new(transport: Arc<dyn BackendTransport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(RegistryInner::default()),
            transport,
            event_tx,
        }
    }

    /// Subscribe to registry change events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_current(&self, current: Option<String>) {
        self.emit(RegistryEvent::CurrentChanged { session_id: current });
    }

    /// Create a session. It is visible as `pending` until the backend
    /// acknowledges it, then becomes active and current. On rejection it is
    /// removed again.
    pub async fn create_session(
        &self,
        name: Option<String>,
        working_directory: Option<PathBuf>,
    ) -> SessionResult<String> {
        let session_id = uuid::Uuid::new_v4().to_string();

        self.inner.write().sessions.push(Session::new(
            &session_id,
            name.clone(),
            working_directory.clone(),
        ));
        self.emit(RegistryEvent::Created {
            session_id: session_id.clone(),
        });
        debug!("Requesting backend session {}", session_id);

        let request = CreateSessionRequest {
            session_id: session_id.clone(),
            name,
            working_directory,
        };

        match self.transport.create_session(request).await {
            Ok(ack) => {
                let still_open = {
                    let mut inner = self.inner.write();
                    match inner.find_mut(&session_id) {
                        Some(session) => {
                            session.activate();
                            if session.working_directory.is_none() {
                                session.working_directory = ack.working_directory;
                            }
                            inner.current = Some(session_id.clone());
                            true
                        }
                        None => false,
                    }
                };

                if !still_open {
                    info!("Session {} was closed before the backend acknowledged it", session_id);
                    if let Err(e) = self.transport.close_session(&session_id).await {
                        warn!("Backend close failed for abandoned session {}: {}", session_id, e);
                    }
                    return Err(SessionError::Abandoned(session_id));
                }

                info!("Created session: {}", session_id);
                self.emit(RegistryEvent::Activated {
                    session_id: session_id.clone(),
                });
                self.emit_current(Some(session_id.clone()));
                Ok(session_id)
            }
            Err(e) => {
                warn!("Backend rejected session {}: {}", session_id, e);
                let removed = self.inner.write().remove(&session_id);
                if let Some((_, current_moved)) = removed {
                    if current_moved {
                        self.emit_current(self.current_id());
                    }
                }
                self.emit(RegistryEvent::CreationFailed {
                    session_id,
                    error: e.to_string(),
                });
                Err(SessionError::CreationFailed(e.to_string()))
            }
        }
    }

    /// Remove a session. Unknown ids are a silent no-op. Events arriving
    /// later for the removed id are discarded.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.inner.write().remove(session_id);
        let Some((session, current_moved)) = removed else {
            debug!("Ignoring delete for unknown session {}", session_id);
            return false;
        };

        info!("Deleted session: {}", session_id);
        self.emit(RegistryEvent::Deleted {
            session_id: session_id.to_string(),
        });
        if current_moved {
            self.emit_current(self.current_id());
        }

        if !session.is_pending() {
            if let Err(e) = self.transport.close_session(session_id).await {
                warn!("Backend close failed for session {}: {}", session_id, e);
            }
        }
        true
    }

    /// Delete each id in the given order; returns how many were removed
    pub async fn delete_many(&self, session_ids: &[String]) -> usize {
        let mut removed = 0;
        for session_id in session_ids {
            if self.delete_session(session_id).await {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every session at once and clear the current pointer
    pub async fn delete_all_sessions(&self) -> usize {
        let drained: Vec<Session> = {
            let mut inner = self.inner.write();
            inner.current = None;
            std::mem::take(&mut inner.sessions)
        };

        if drained.is_empty() {
            return 0;
        }

        info!("Deleted all {} sessions", drained.len());
        self.emit(RegistryEvent::Cleared);
        self.emit_current(None);

        for session in drained.iter().filter(|s| !s.is_pending()) {
            if let Err(e) = self.transport.close_session(&session.id).await {
                warn!("Backend close failed for session {}: {}", session.id, e);
            }
        }
        drained.len()
    }

    /// Make a session current. Known sessions switch immediately; unknown
    /// ones are loaded from the backend first.
    pub async fn resume_session(&self, session_id: &str) -> SessionResult<()> {
        {
            let mut inner = self.inner.write();
            if inner.contains(session_id) {
                inner.current = Some(session_id.to_string());
                drop(inner);
                self.emit_current(Some(session_id.to_string()));
                return Ok(());
            }
            inner.sessions.push(Session::new(session_id, None, None));
        }
        self.emit(RegistryEvent::Created {
            session_id: session_id.to_string(),
        });
        debug!("Loading history for session {}", session_id);

        match self.transport.load_session(session_id).await {
            Ok(history) => {
                let mut inner = self.inner.write();
                let Some(session) = inner.find_mut(session_id) else {
                    drop(inner);
                    info!("Session {} was closed while its history loaded", session_id);
                    return Err(SessionError::Abandoned(session_id.to_string()));
                };
                session.name = history.name;
                session.working_directory = history.working_directory;
                session.messages = history.messages;
                session.token_count = history.token_count;
                session.total_cost = history.total_cost;
                session.activate();
                inner.current = Some(session_id.to_string());
                drop(inner);

                info!("Resumed session: {}", session_id);
                self.emit(RegistryEvent::Activated {
                    session_id: session_id.to_string(),
                });
                self.emit_current(Some(session_id.to_string()));
                Ok(())
            }
            Err(e) => {
                warn!("Could not resume session {}: {}", session_id, e);
                let removed = self.inner.write().remove(session_id);
                if let Some((_, current_moved)) = removed {
                    self.emit(RegistryEvent::Deleted {
                        session_id: session_id.to_string(),
                    });
                    if current_moved {
                        self.emit_current(self.current_id());
                    }
                }
                Err(SessionError::ResumeFailed {
                    session_id: session_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Append a user message and hand it to the backend
    pub async fn send_message(&self, session_id: &str, content: &str) -> SessionResult<()> {
        {
            let mut inner = self.inner.write();
            let session = inner
                .find_mut(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
            if session.is_pending() {
                return Err(SessionError::SessionNotActive(session_id.to_string()));
            }
            session.upsert_message(Message::user(content));
            session.streaming = true;
            session.stop = None;
            session.last_error = None;
        }
        self.emit(RegistryEvent::Updated {
            session_id: session_id.to_string(),
        });

        if let Err(e) = self.transport.send_message(session_id, content).await {
            warn!("Send failed for session {}: {}", session_id, e);
            if let Some(session) = self.inner.write().find_mut(session_id) {
                session.streaming = false;
                session.last_error = Some(e.to_string());
            }
            self.emit(RegistryEvent::Updated {
                session_id: session_id.to_string(),
            });
            return Err(SessionError::SendFailed(e.to_string()));
        }
        Ok(())
    }

    /// Ask the backend to stop the running turn. Streaming flags are cleared
    /// right away; a later run-ending event confirms the stop.
    pub async fn stop_session(&self, session_id: &str) -> SessionResult<()> {
        {
            let mut inner = self.inner.write();
            let session = inner
                .find_mut(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
            session.end_streaming();
            session.stop = Some(StopState::Requested);
        }
        self.emit(RegistryEvent::Updated {
            session_id: session_id.to_string(),
        });
        info!("Stop requested for session {}", session_id);

        if let Err(e) = self.transport.interrupt(session_id).await {
            warn!("Stop request failed for session {}: {}", session_id, e);
            if let Some(session) = self.inner.write().find_mut(session_id) {
                if session.stop == Some(StopState::Requested) {
                    session.stop = Some(StopState::Failed(e.to_string()));
                }
            }
            self.emit(RegistryEvent::Updated {
                session_id: session_id.to_string(),
            });
            return Err(SessionError::StopFailed(e.to_string()));
        }
        Ok(())
    }

    /// Fold a pushed backend event into the owning session. Returns `false`
    /// when the event was discarded (unknown session or not a session event).
    pub fn apply_event(&self, event: &ServerEvent) -> bool {
        let session_id = event.session_id();
        let applied = {
            let mut inner = self.inner.write();
            let Some(session) = inner.find_mut(session_id) else {
                debug!("Discarding {} for unknown session {}", event.kind(), session_id);
                return false;
            };

            let applied = match event {
                ServerEvent::Message { message, .. } => {
                    session.upsert_message(message.clone());
                    true
                }
                ServerEvent::StreamEnd { .. } => true,
                ServerEvent::Result {
                    token_count, cost, ..
                } => {
                    if let Some(tokens) = token_count {
                        session.token_count = *tokens;
                    }
                    session.total_cost += cost;
                    true
                }
                ServerEvent::Error { message, .. } => {
                    session.upsert_message(Message::new(MessageKind::Error, message.clone()));
                    session.last_error = Some(message.clone());
                    true
                }
                ServerEvent::TokenUpdate(data) => {
                    session.token_count = data.current;
                    true
                }
                ServerEvent::CompactStart { .. } | ServerEvent::CompactComplete { .. } => false,
            };

            if event.ends_run() {
                session.end_streaming();
                session.confirm_stop();
            }
            applied
        };

        if applied {
            self.emit(RegistryEvent::Updated {
                session_id: session_id.to_string(),
            });
        }
        applied
    }

    /// Get a copy of a session
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.inner
            .read()
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
    }

    /// All sessions in tab order
    pub fn snapshot(&self) -> Vec<Session> {
        self.inner.read().sessions.clone()
    }

    /// Session ids in tab order
    pub fn order(&self) -> Vec<String> {
        self.inner.read().sessions.iter().map(|s| s.id.clone()).collect()
    }

    pub fn current_id(&self) -> Option<String> {
        self.inner.read().current.clone()
    }

    pub fn current(&self) -> Option<Session> {
        let inner = self.inner.read();
        let current = inner.current.as_deref()?;
        inner.sessions.iter().find(|s| s.id == current).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.read().contains(session_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().sessions.is_empty()
    }
}

/// Session registry errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session not active: {0}")]
    SessionNotActive(String),

    #[error("Session creation failed: {0}")]
    CreationFailed(String),

    #[error("Session closed before the backend answered: {0}")]
    Abandoned(String),

    #[error("Could not resume session {session_id}: {reason}")]
    ResumeFailed { session_id: String, reason: String },

    #[error("Message not delivered: {0}")]
    SendFailed(String),

    #[error("Stop request failed: {0}")]
    StopFailed(String),
}

impl From<SessionError> for String {
    fn from(err: SessionError) -> String {
        err.to_string()
    }
}

/// Result type alias for registry operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::FakeTransport;
    use crate::channel::{ChannelError, SessionHistory};
    use crate::session::state::SessionStatus;

    fn registry() -> (Arc<SessionRegistry>, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        (Arc::new(SessionRegistry::new(transport.clone())), transport)
    }

    fn assert_current_valid(registry: &SessionRegistry) {
        if let Some(current) = registry.current_id() {
            assert!(registry.contains(&current), "current {} not in registry", current);
        }
    }

    #[tokio::test]
    async fn test_create_session() {
        let (registry, transport) = registry();
        let id = registry
            .create_session(Some("Demo".into()), Some(PathBuf::from("/work/demo")))
            .await
            .unwrap();

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.name.as_deref(), Some("Demo"));
        assert_eq!(registry.current_id(), Some(id.clone()));
        assert_eq!(transport.created.lock()[0].session_id, id);
    }

    #[tokio::test]
    async fn test_sessions_append_in_order() {
        let (registry, _) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        let b = registry.create_session(None, None).await.unwrap();
        let c = registry.create_session(None, None).await.unwrap();
        assert_eq!(registry.order(), vec![a, b, c.clone()]);
        assert_eq!(registry.current_id(), Some(c));
    }

    #[tokio::test]
    async fn test_creation_failure_rolls_back() {
        let (registry, transport) = registry();
        let mut events = registry.subscribe();
        transport.fail_creates(ChannelError::rejected(500, "spawn failed"));

        let result = registry.create_session(None, None).await;
        assert!(matches!(result, Err(SessionError::CreationFailed(_))));
        assert!(registry.is_empty());
        assert_eq!(registry.current_id(), None);

        assert!(matches!(events.try_recv().unwrap(), RegistryEvent::Created { .. }));
        assert!(matches!(
            events.try_recv().unwrap(),
            RegistryEvent::CreationFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_pending_session_is_visible_until_ack() {
        let (registry, transport) = registry();
        let gate = transport.hold_creates();

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.create_session(None, None).await })
        };
        gate.entered.notified().await;

        let pending = registry.snapshot();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, SessionStatus::Pending);
        assert_eq!(registry.current_id(), None);

        gate.release.notify_one();
        let id = task.await.unwrap().unwrap();
        assert_eq!(registry.get(&id).unwrap().status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_failed_creation_after_delete_does_not_resurrect() {
        let (registry, transport) = registry();
        let gate = transport.hold_creates();

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.create_session(None, None).await })
        };
        gate.entered.notified().await;

        let pending_id = registry.order()[0].clone();
        assert!(registry.delete_session(&pending_id).await);

        transport.fail_creates(ChannelError::rejected(500, "late failure"));
        gate.release.notify_one();

        assert!(task.await.unwrap().is_err());
        assert!(registry.is_empty());
        assert_eq!(registry.current_id(), None);
        // The backend refused it, so there is nothing to close
        assert!(transport.closed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_late_ack_after_delete_does_not_resurrect() {
        let (registry, transport) = registry();
        let gate = transport.hold_creates();

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.create_session(None, None).await })
        };
        gate.entered.notified().await;
        let pending_id = registry.order()[0].clone();
        registry.delete_session(&pending_id).await;
        gate.release.notify_one();

        assert!(matches!(task.await.unwrap(), Err(SessionError::Abandoned(_))));
        assert!(registry.is_empty());
        assert_eq!(registry.current_id(), None);
        // The backend did create it, so the late ack releases it again
        assert_eq!(*transport.closed.lock(), vec![pending_id]);
    }

    #[tokio::test]
    async fn test_delete_first_current_clears_pointer() {
        let (registry, _) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        let _b = registry.create_session(None, None).await.unwrap();
        let _c = registry.create_session(None, None).await.unwrap();
        registry.resume_session(&a).await.unwrap();

        registry.delete_session(&a).await;
        assert_eq!(registry.current_id(), None);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_current_falls_back_left() {
        let (registry, transport) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        let b = registry.create_session(None, None).await.unwrap();
        let _c = registry.create_session(None, None).await.unwrap();
        registry.resume_session(&b).await.unwrap();

        registry.delete_session(&b).await;
        assert_eq!(registry.current_id(), Some(a));
        assert_eq!(*transport.closed.lock(), vec![b]);
    }

    #[tokio::test]
    async fn test_delete_non_current_keeps_pointer() {
        let (registry, _) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        let b = registry.create_session(None, None).await.unwrap();

        registry.delete_session(&a).await;
        assert_eq!(registry.current_id(), Some(b));
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let (registry, _) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        assert!(!registry.delete_session("missing").await);
        assert_eq!(registry.current_id(), Some(a));
    }

    #[tokio::test]
    async fn test_delete_all_sessions() {
        let (registry, transport) = registry();
        registry.create_session(None, None).await.unwrap();
        registry.create_session(None, None).await.unwrap();

        assert_eq!(registry.delete_all_sessions().await, 2);
        assert!(registry.is_empty());
        assert_eq!(registry.current_id(), None);
        assert_eq!(transport.closed.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_current_always_valid_across_sequences() {
        let (registry, _) = registry();
        let mut ids = Vec::new();
        for round in 0..6 {
            ids.push(registry.create_session(None, None).await.unwrap());
            assert_current_valid(&registry);
            if round % 2 == 1 {
                let victim = ids.remove(round / 2 % ids.len());
                registry.delete_session(&victim).await;
                assert_current_valid(&registry);
            }
        }
        for id in ids.iter().rev() {
            registry.delete_session(id).await;
            assert_current_valid(&registry);
        }
        assert_eq!(registry.current_id(), None);
    }

    #[tokio::test]
    async fn test_resume_known_session_only_switches() {
        let (registry, transport) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        let _b = registry.create_session(None, None).await.unwrap();

        registry.resume_session(&a).await.unwrap();
        assert_eq!(registry.current_id(), Some(a));
        assert_eq!(registry.len(), 2);
        assert!(transport.closed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_resume_unknown_session_loads_history() {
        let (registry, transport) = registry();
        transport.add_history(SessionHistory {
            session_id: "stored-1".to_string(),
            name: Some("Old work".to_string()),
            working_directory: Some(PathBuf::from("/work/old")),
            messages: vec![Message::user("earlier question")],
            token_count: 4200,
            total_cost: 0.12,
        });

        registry.resume_session("stored-1").await.unwrap();

        let session = registry.current().unwrap();
        assert_eq!(session.id, "stored-1");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.token_count, 4200);
    }

    #[tokio::test]
    async fn test_resume_unknown_failure_leaves_nothing() {
        let (registry, _) = registry();
        let a = registry.create_session(None, None).await.unwrap();

        let result = registry.resume_session("nope").await;
        assert!(matches!(result, Err(SessionError::ResumeFailed { .. })));
        assert_eq!(registry.order(), vec![a.clone()]);
        assert_eq!(registry.current_id(), Some(a));
    }

    #[tokio::test]
    async fn test_events_for_deleted_session_are_discarded() {
        let (registry, _) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        registry.delete_session(&a).await;

        let applied = registry.apply_event(&ServerEvent::Message {
            session_id: a.clone(),
            message: Message::new(MessageKind::Assistant, "late"),
        });
        assert!(!applied);
        assert!(registry.get(&a).is_none());
    }

    #[tokio::test]
    async fn test_send_message_and_stream() {
        let (registry, transport) = registry();
        let a = registry.create_session(None, None).await.unwrap();

        registry.send_message(&a, "hello").await.unwrap();
        assert!(registry.get(&a).unwrap().streaming);
        assert_eq!(transport.sent.lock()[0], (a.clone(), "hello".to_string()));

        let mut reply = Message::new(MessageKind::Assistant, "Hi");
        reply.streaming = true;
        registry.apply_event(&ServerEvent::Message {
            session_id: a.clone(),
            message: reply.clone(),
        });
        reply.content = "Hi there".to_string();
        registry.apply_event(&ServerEvent::Message {
            session_id: a.clone(),
            message: reply,
        });
        registry.apply_event(&ServerEvent::Result {
            session_id: a.clone(),
            token_count: Some(1500),
            cost: 0.01,
        });

        let session = registry.get(&a).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "Hi there");
        assert!(!session.streaming);
        assert!(!session.messages[1].streaming);
        assert_eq!(session.token_count, 1500);
    }

    #[tokio::test]
    async fn test_send_failure_clears_streaming() {
        let (registry, transport) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        transport.fail_sends(ChannelError::ConnectionFailed("down".into()));

        let result = registry.send_message(&a, "hello").await;
        assert!(matches!(result, Err(SessionError::SendFailed(_))));
        let session = registry.get(&a).unwrap();
        assert!(!session.streaming);
        assert!(session.last_error.is_some());
    }

    #[tokio::test]
    async fn test_stop_is_optimistic_then_confirmed() {
        let (registry, transport) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        registry.send_message(&a, "long task").await.unwrap();

        registry.stop_session(&a).await.unwrap();
        let session = registry.get(&a).unwrap();
        assert!(!session.streaming);
        assert_eq!(session.stop, Some(StopState::Requested));
        assert_eq!(*transport.interrupts.lock(), vec![a.clone()]);

        registry.apply_event(&ServerEvent::StreamEnd {
            session_id: a.clone(),
        });
        assert_eq!(registry.get(&a).unwrap().stop, Some(StopState::Confirmed));
    }

    #[tokio::test]
    async fn test_stop_failure_is_recorded() {
        let (registry, transport) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        transport.fail_interrupts(ChannelError::rejected(409, "not running"));

        let result = registry.stop_session(&a).await;
        assert!(matches!(result, Err(SessionError::StopFailed(_))));
        assert!(matches!(
            registry.get(&a).unwrap().stop,
            Some(StopState::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_error_event_records_message() {
        let (registry, _) = registry();
        let a = registry.create_session(None, None).await.unwrap();
        registry.send_message(&a, "go").await.unwrap();

        registry.apply_event(&ServerEvent::Error {
            session_id: a.clone(),
            message: "tool crashed".to_string(),
        });

        let session = registry.get(&a).unwrap();
        assert!(!session.streaming);
        assert_eq!(session.last_error.as_deref(), Some("tool crashed"));
        assert_eq!(session.messages.last().unwrap().kind, MessageKind::Error);
    }
}
