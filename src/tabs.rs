//! Tab strip presentation
//!
//! Turns the registry into tab rows and resolves context-menu bulk closes
//! into an explicit list of ids. The list is computed once from the order at
//! invocation time and then deleted one by one, so sessions created while a
//! bulk close runs are never affected.

use serde::Serialize;

use crate::session::{Session, SessionRegistry};

/// One tab in the strip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub session_id: String,
    pub title: String,
    pub active: bool,
    pub streaming: bool,
    pub pending: bool,
}

/// Close actions offered by the tab context menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabAction {
    Close(String),
    CloseOthers(String),
    CloseLeft(String),
    CloseRight(String),
    CloseAll,
}

impl TabAction {
    /// Ids to delete, in order, given the tab order snapshot. An anchor that
    /// is not in the order yields nothing.
    pub fn targets(&self, order: &[String]) -> Vec<String> {
        let position = |id: &str| order.iter().position(|candidate| candidate == id);

        match self {
            Self::Close(id) => order.iter().filter(|c| *c == id).cloned().collect(),
            Self::CloseOthers(id) => match position(id) {
                Some(_) => order.iter().filter(|c| *c != id).cloned().collect(),
                None => Vec::new(),
            },
            Self::CloseLeft(id) => match position(id) {
                Some(index) => order[..index].to_vec(),
                None => Vec::new(),
            },
            Self::CloseRight(id) => match position(id) {
                Some(index) => order[index + 1..].to_vec(),
                None => Vec::new(),
            },
            Self::CloseAll => order.to_vec(),
        }
    }
}

/// Build tab rows from sessions in order
pub fn tabs_for(sessions: &[Session], current: Option<&str>) -> Vec<Tab> {
    sessions
        .iter()
        .map(|session| Tab {
            session_id: session.id.clone(),
            title: session.title(),
            active: current == Some(session.id.as_str()),
            streaming: session.streaming,
            pending: session.is_pending(),
        })
        .collect()
}

/// Tab rows for the registry's current state
pub fn tabs(registry: &SessionRegistry) -> Vec<Tab> {
    let current = registry.current_id();
    tabs_for(&registry.snapshot(), current.as_deref())
}

/// Run a close action against the registry. Returns how many tabs closed.
pub async fn apply(registry: &SessionRegistry, action: &TabAction) -> usize {
    if *action == TabAction::CloseAll {
        return registry.delete_all_sessions().await;
    }
    let targets = action.targets(&registry.order());
    registry.delete_many(&targets).await
}
