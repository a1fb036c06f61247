//! Compaction Types
//!
//! Token budget and compaction state shared between the monitor and the
//! channel wire format.

use serde::{Deserialize, Serialize};

/// Per-session compaction settings reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactConfig {
    /// Compaction is available for this session
    pub enabled: bool,
    /// Backend compacts on its own when the threshold is crossed
    #[serde(default)]
    pub auto_compact: bool,
    /// Token count at which the UI shows a warning
    pub threshold: u64,
    /// Context window ceiling
    pub max_tokens: u64,
}

/// Latest token usage for a session, replaced wholesale on every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub session_id: String,
    pub current: u64,
    pub max: u64,
    /// current / max as computed by the backend, passed through unchanged
    pub percentage: f64,
}

impl TokenData {
    /// Percentage label, e.g. `75%`
    pub fn percentage_label(&self) -> String {
        format_percentage(self.percentage)
    }

    /// `current / max` label, e.g. `1.5k / 200.0k`
    pub fn usage_label(&self) -> String {
        format!(
            "{} / {}",
            format_token_count(self.current),
            format_token_count(self.max)
        )
    }
}

/// Compaction phase, driven only by backend events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactPhase {
    Idle,
    Compacting,
}

impl Default for CompactPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for CompactPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Compacting => write!(f, "compacting"),
        }
    }
}

/// State of a user-initiated compaction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ManualCompact {
    /// Sent, start event not seen yet
    Requested,
    /// Backend emitted the start event
    Confirmed,
    /// Backend rejected the request
    Failed(String),
}

/// Format a token count for display: `950`, `1.5k`, `2.30m`
pub fn format_token_count(tokens: u64) -> String {
    // Counts that round up to 1000.0k are shown in millions
    let tenths_of_k = (tokens as f64 / 100.0).round();
    if tokens >= 1_000_000 || tenths_of_k >= 10_000.0 {
        format!("{:.2}m", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

/// Format a usage fraction as a whole percentage; out-of-range values are
/// shown as-is.
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}
