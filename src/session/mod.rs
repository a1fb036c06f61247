//! Session Management Module
//!
//! Ordered, in-memory session registry with a single current-session pointer:
//! - pending/active lifecycle negotiated with the backend
//! - left-neighbour fallback when the current session is closed
//! - change notifications for views

pub mod events;
pub mod manager;
pub mod state;

pub use events::RegistryEvent;
pub use manager::{SessionError, SessionRegistry, SessionResult};
pub use state::{Message, MessageKind, Session, SessionStatus, StopState};
