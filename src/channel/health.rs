//! Backend Liveness Monitoring
//!
//! Periodically pings the backend and reports whether it answers. This is an
//! advisory signal for the UI only: session and compaction state come from
//! pushed events, never from here.

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::transport::BackendTransport;

/// Liveness status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessStatus {
    /// Backend answered the last probe
    Healthy,
    /// Backend did not answer the last probe
    Unhealthy,
    /// No probe has completed yet
    Unknown,
}

impl Default for LivenessStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Liveness information for the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Liveness {
    pub status: LivenessStatus,
    /// Latency of the last successful probe in milliseconds
    pub latency_ms: Option<u64>,
    /// Last probe timestamp (RFC3339)
    pub last_check: Option<String>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl Liveness {
    fn record_success(&mut self, latency_ms: u64) {
        self.status = LivenessStatus::Healthy;
        self.latency_ms = Some(latency_ms);
        self.last_check = Some(chrono::Utc::now().to_rfc3339());
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self, error: impl Into<String>) {
        self.status = LivenessStatus::Unhealthy;
        self.latency_ms = None;
        self.last_check = Some(chrono::Utc::now().to_rfc3339());
        self.last_error = Some(error.into());
        self.consecutive_failures += 1;
    }
}

/// Liveness event types
#[derive(Debug, Clone)]
pub enum LivenessEvent {
    StatusChanged {
        old_status: LivenessStatus,
        new_status: LivenessStatus,
    },
    /// Backend missed N probes in a row
    Unreachable { consecutive_failures: u32 },
    /// Backend answered again after being unhealthy
    Recovered,
}

/// Backend liveness monitor
pub struct LivenessMonitor {
    transport: Arc<dyn BackendTransport>,
    liveness: Arc<RwLock<Liveness>>,
    event_tx: broadcast::Sender<LivenessEvent>,
    interval: Duration,
    unreachable_threshold: u32,
}

impl LivenessMonitor {
    pub fn new(
        transport: Arc<dyn BackendTransport>,
        interval: Duration,
        unreachable_threshold: u32,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(32);
        Self {
            transport,
            liveness: Arc::new(RwLock::new(Liveness::default())),
            event_tx,
            interval,
            unreachable_threshold,
        }
    }

    /// Subscribe to liveness events
    pub fn subscribe(&self) -> broadcast::Receiver<LivenessEvent> {
        self.event_tx.subscribe()
    }

    /// Current liveness snapshot
    pub fn liveness(&self) -> Liveness {
        self.liveness.read().clone()
    }

    /// Run a single probe and record the outcome
    pub async fn check(&self) -> Liveness {
        probe(
            self.transport.as_ref(),
            &self.liveness,
            &self.event_tx,
            self.unreachable_threshold,
        )
        .await
    }

    /// Start periodic probing. The returned guard stops the timer when
    /// dropped.
    pub fn start(&self) -> LivenessGuard {
        let transport = self.transport.clone();
        let liveness = self.liveness.clone();
        let event_tx = self.event_tx.clone();
        let period = self.interval;
        let threshold = self.unreachable_threshold;

        info!("Starting backend liveness checks every {:?}", period);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                probe(transport.as_ref(), &liveness, &event_tx, threshold).await;
            }
        });

        LivenessGuard { handle: Some(handle) }
    }
}

async fn probe(
    transport: &dyn BackendTransport,
    liveness: &RwLock<Liveness>,
    event_tx: &broadcast::Sender<LivenessEvent>,
    unreachable_threshold: u32,
) -> Liveness {
    let start = Instant::now();
    let result = transport.ping().await;

    let mut current = liveness.read().clone();
    let old_status = current.status;

    match result {
        Ok(()) => {
            let latency = start.elapsed().as_millis() as u64;
            current.record_success(latency);
            if old_status == LivenessStatus::Unhealthy {
                let _ = event_tx.send(LivenessEvent::Recovered);
            }
            debug!("Backend liveness probe ok: {}ms", latency);
        }
        Err(e) => {
            current.record_failure(e.to_string());
            if current.consecutive_failures == unreachable_threshold {
                let _ = event_tx.send(LivenessEvent::Unreachable {
                    consecutive_failures: current.consecutive_failures,
                });
            }
            warn!(
                "Backend liveness probe failed: {} (failures: {})",
                e, current.consecutive_failures
            );
        }
    }

    if old_status != current.status {
        let _ = event_tx.send(LivenessEvent::StatusChanged {
            old_status,
            new_status: current.status,
        });
    }

    *liveness.write() = current.clone();
    current
}

/// Stops periodic probing when dropped
#[derive(Debug)]
pub struct LivenessGuard {
    handle: Option<JoinHandle<()>>,
}

impl LivenessGuard {
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Backend liveness checks stopped");
        }
    }
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.abort();
    }
}
