//! Event Channel
//!
//! Transport between the client core and the local backend process:
//! - request/acknowledgment calls (`BackendTransport`)
//! - typed fan-out of pushed events keyed by event kind and session (`EventBus`)
//! - advisory backend liveness probing

pub mod bus;
pub mod error;
pub mod health;
pub mod http;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::{EventBus, Subscription, SubscriptionKey};
pub use error::{ChannelError, ChannelResult};
pub use health::{Liveness, LivenessEvent, LivenessGuard, LivenessMonitor, LivenessStatus};
pub use http::HttpTransport;
pub use transport::{BackendTransport, TransportConfig, TransportFactory};
pub use types::{CreateSessionRequest, EventKind, ServerEvent, SessionAck, SessionHistory};
