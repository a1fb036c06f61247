// Yume client core
//
// Session tabs, transcript state and context-compaction tracking for the
// desktop shell, talking to the local backend over the event channel.

pub mod channel;
pub mod client;
pub mod compaction;
pub mod config;
pub mod projects;
pub mod session;
pub mod tabs;

pub use client::{Client, ClientError, ClientResult};
pub use config::ClientConfig;
