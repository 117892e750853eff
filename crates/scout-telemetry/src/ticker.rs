// SPDX-License-Identifier: MIT OR Apache-2.0
//! Periodic process RSS/CPU sampling, wired to the core agent connection
//! (spec §4.H).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scout_error::ScoutError;
use scout_protocol::builder::AgentRequestBuilder;
use scout_transport::AgentConnection;
use sysinfo::{Pid, System};

/// Default tick interval, matching spec §4.H and the Engine constructor's
/// `statisticsIntervalMS` option.
pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// The narrow send capability the ticker needs — a send-only analogue of
/// `scout-tracing::Sink`, kept local so `scout-telemetry` only depends on
/// `scout-transport` (per the crate map), not on `scout-tracing`.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Enqueue `request` for fire-and-forget delivery.
    async fn send_async(&self, request: scout_protocol::AgentRequest) -> Result<(), ScoutError>;
}

#[async_trait]
impl TelemetrySink for AgentConnection {
    async fn send_async(&self, request: scout_protocol::AgentRequest) -> Result<(), ScoutError> {
        AgentConnection::send_async(self, request).await.map_err(ScoutError::from)
    }
}

/// Periodic sampler of process RSS (MB) and CPU utilization (%), emitting
/// one `ApplicationEvent{MemoryUsageMB}` and one `ApplicationEvent{
/// CPUUtilizationPercent}` per tick. Self-disables (stops ticking) the
/// first time it finds no connection set, per spec §4.H.
pub struct StatsTicker {
    sink: Mutex<Option<Arc<dyn TelemetrySink>>>,
    interval_ms: u64,
    ticks_sent: AtomicU64,
}

impl StatsTicker {
    /// Build a ticker with the given interval, initially with no
    /// connection set.
    #[must_use]
    pub fn new(interval_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            interval_ms,
            ticks_sent: AtomicU64::new(0),
        })
    }

    /// Set (or clear) the connection the ticker reports through.
    pub fn set_connection(&self, sink: Option<Arc<dyn TelemetrySink>>) {
        *self.sink.lock().unwrap() = sink;
    }

    /// Number of sample pairs successfully sent so far (diagnostic).
    #[must_use]
    pub fn ticks_sent(&self) -> u64 {
        self.ticks_sent.load(Ordering::Relaxed)
    }

    fn current_sink(&self) -> Option<Arc<dyn TelemetrySink>> {
        self.sink.lock().unwrap().clone()
    }

    /// Spawn the ticker loop as a background task. The returned handle
    /// completes once the ticker self-disables or is aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut system = System::new_all();
            let pid = Pid::from_u32(std::process::id());
            let mut interval = tokio::time::interval(Duration::from_millis(self.interval_ms));
            interval.tick().await; // first tick fires immediately; skip so the first sample follows a real interval

            loop {
                interval.tick().await;

                let Some(sink) = self.current_sink() else {
                    tracing::info!("scout_apm: stats ticker self-disabling, no agent connection");
                    break;
                };

                system.refresh_all();
                let Some(process) = system.process(pid) else {
                    tracing::warn!("scout_apm: stats ticker could not read its own process, self-disabling");
                    break;
                };

                let memory_mb = process.memory() as f64 / (1024.0 * 1024.0);
                let cpu_percent = f64::from(process.cpu_usage());
                let now = Utc::now();

                let memory_event =
                    AgentRequestBuilder::application_event(memory_mb, "MemoryUsageMB", "StatsTicker", now);
                let cpu_event =
                    AgentRequestBuilder::application_event(cpu_percent, "CPUUtilizationPercent", "StatsTicker", now);

                let mut ok = true;
                if let Err(e) = sink.send_async(memory_event).await {
                    tracing::warn!(error = %e, "scout_apm: failed to send MemoryUsageMB");
                    ok = false;
                }
                if let Err(e) = sink.send_async(cpu_event).await {
                    tracing::warn!(error = %e, "scout_apm: failed to send CPUUtilizationPercent");
                    ok = false;
                }
                if ok {
                    self.ticks_sent.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    }
}
