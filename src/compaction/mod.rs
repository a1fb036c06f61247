//! Token/Compaction Monitoring
//!
//! Follows the backend's compaction lifecycle for the current session and
//! derives what the context indicator displays.

pub mod monitor;
pub mod types;

pub use monitor::{CompactStatus, ConfigState, MonitorError, MonitorResult, MonitorView, TokenMonitor};
pub use types::{format_percentage, format_token_count, CompactConfig, CompactPhase, ManualCompact, TokenData};
