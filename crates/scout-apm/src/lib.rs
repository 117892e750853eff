// SPDX-License-Identifier: MIT OR Apache-2.0
//! scout-apm
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The public API surface embedding applications link against: one
//! [`Engine`] wiring together config resolution, the core-agent lifecycle,
//! the tracing engine, and the stats ticker behind the single constructor
//! and method set spec §6 names.

mod event;
mod instance;
mod log_sink;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scout_config::{Resolver, ScoutConfig};
use scout_error::{ErrorCode, ScoutError};
use scout_lifecycle::Lifecycle;
use scout_telemetry::StatsTicker;
use scout_tracing::{TracingConfig, TracingEngine};
use tokio::sync::{broadcast, OnceCell};

pub use event::EngineEvent;
pub use log_sink::{LogRecord, LogSink, TracingLogSink};
pub use scout_context::{Request, Span};
pub use scout_lifecycle::{DownloadOptions, Downloader, Handle, LifecycleState};
pub use scout_tracing::{SpanContext, SyncParent, TagParent, TransactionHandle};

/// Options accepted by [`Engine::new`], mirroring the Node Engine
/// constructor's `{logFn, downloadOptions, appMeta, slowRequestThresholdMs,
/// statisticsIntervalMS}` (spec §6).
#[derive(Default)]
pub struct EngineOptions {
    /// Supplies core agent binaries when `coreAgentLaunch` is `true` (spec
    /// §1 Non-goal: download/verification itself is out of scope). Rust
    /// equivalent of the Node constructor's `downloadOptions` — here it's
    /// the whole capability, not just a data bag.
    pub downloader: Option<Arc<dyn Downloader>>,
    /// Receives a copy of the engine's own log events. Rust equivalent of
    /// the Node constructor's `logFn`. Defaults to [`TracingLogSink`].
    pub log_sink: Option<Arc<dyn LogSink>>,
    /// Extra top-level keys merged into `ApplicationEvent(ScoutMetadata)`.
    pub app_meta: Option<serde_json::Value>,
    /// When a `transaction`/`instrument` body runs at least this long, the
    /// engine tags it `slow=true` on completion. `None` disables the check.
    pub slow_request_threshold_ms: Option<u64>,
    /// Stats ticker interval override; defaults to
    /// [`scout_telemetry::DEFAULT_INTERVAL_MS`].
    pub statistics_interval_ms: Option<u64>,
}

/// The embedding application's handle onto the instrumentation runtime.
///
/// Construct with [`Engine::new`], call [`Engine::setup`] once before using
/// any tracing method, and [`Engine::shutdown`] when the host process is
/// exiting (spec §4.E).
pub struct Engine {
    id: u64,
    initial_config: ScoutConfig,
    lifecycle: Arc<Lifecycle>,
    tracing: Arc<OnceCell<TracingEngine>>,
    ticker: Arc<StatsTicker>,
    bus: broadcast::Sender<EngineEvent>,
    log_sink: Arc<dyn LogSink>,
    slow_request_threshold_ms: Option<u64>,
    became_active: Arc<AtomicBool>,
    shutdown_event_published: AtomicBool,
}

impl Engine {
    /// Build an `Engine` over `resolver`. Does not connect to anything —
    /// call [`Self::setup`] to do that.
    #[must_use]
    pub fn new(resolver: Resolver, options: EngineOptions) -> Self {
        let initial_config = resolver.snapshot();
        let mut lifecycle = Lifecycle::new(resolver, options.downloader);
        if let Some(app_meta) = options.app_meta {
            lifecycle = lifecycle.with_app_meta(app_meta);
        }
        let (bus, _) = broadcast::channel(256);
        let interval_ms = options.statistics_interval_ms.unwrap_or(scout_telemetry::DEFAULT_INTERVAL_MS);

        Self {
            id: instance::next_engine_id(),
            initial_config,
            lifecycle: Arc::new(lifecycle),
            tracing: Arc::new(OnceCell::new()),
            ticker: StatsTicker::new(interval_ms),
            bus,
            log_sink: options.log_sink.unwrap_or_else(|| Arc::new(TracingLogSink)),
            slow_request_threshold_ms: options.slow_request_threshold_ms,
            became_active: Arc::new(AtomicBool::new(false)),
            shutdown_event_published: AtomicBool::new(false),
        }
    }

    /// Run spec §4.E's `setup()` steps 1-7: spawn-or-attach, connect,
    /// register, install the exception handler and claim the process-wide
    /// active-instance slot (iff no other `Engine` holds it), start the
    /// stats ticker.
    ///
    /// Idempotent: concurrent callers share one initialization, per
    /// [`scout_lifecycle::Lifecycle::setup`].
    ///
    /// # Errors
    ///
    /// Returns the same error to every concurrent caller if setup fails.
    pub async fn setup(&self) -> Result<(), Arc<ScoutError>> {
        let id = self.id;
        let config = self.initial_config.clone();
        let tracing_cell = Arc::clone(&self.tracing);
        let ticker = Arc::clone(&self.ticker);
        let bus = self.bus.clone();
        let became_active = Arc::clone(&self.became_active);

        let result = self
            .lifecycle
            .setup(move |connection| async move {
                let tracing_config = TracingConfig::from(&config);
                let sink: Arc<dyn scout_tracing::Sink> = Arc::clone(&connection);
                let tracing_engine = TracingEngine::new(sink, tracing_config);
                let _ = tracing_cell.set(tracing_engine.clone());

                let telemetry_sink: Arc<dyn scout_telemetry::TelemetrySink> = Arc::clone(&connection);
                ticker.set_connection(Some(telemetry_sink));
                Arc::clone(&ticker).spawn();

                if instance::try_register_active(id) {
                    became_active.store(true, Ordering::SeqCst);
                    instance::install_exception_handler(tracing_engine.clone());
                }

                let mut conn_events = connection.subscribe();
                let bus_conn = bus.clone();
                tokio::spawn(async move {
                    while let Ok(event) = conn_events.recv().await {
                        let _ = bus_conn.send(EngineEvent::Agent(event));
                    }
                });

                let mut trace_events = tracing_engine.subscribe();
                let bus_trace = bus.clone();
                tokio::spawn(async move {
                    while let Ok(event) = trace_events.recv().await {
                        let _ = bus_trace.send(event.into());
                    }
                });
            })
            .await;

        match &result {
            Ok(_) => self.log_sink.on_log(&LogRecord {
                level: tracing::Level::INFO,
                message: "scout_apm: engine setup complete".into(),
            }),
            Err(e) => self.log_sink.on_log(&LogRecord {
                level: tracing::Level::ERROR,
                message: format!("scout_apm: engine setup failed: {e}"),
            }),
        }

        result.map(|_handle| ())
    }

    /// Non-blocking readiness check (spec §4.E: "non-blocking variant fails
    /// fast with `InstanceNotReady`").
    ///
    /// # Errors
    ///
    /// [`ErrorCode::InstanceNotReady`] if setup hasn't finished.
    pub fn require_ready(&self) -> Result<(), ScoutError> {
        self.lifecycle.require_ready()
    }

    /// Reverses `setup()`: stop the ticker, remove the exception handler and
    /// release the active-instance slot (iff this engine holds either),
    /// disconnect, optionally stop the agent process, emit [`EngineEvent::Shutdown`].
    ///
    /// Idempotent from any number of concurrent callers.
    ///
    /// # Errors
    ///
    /// Propagates from the underlying [`scout_lifecycle::Lifecycle::shutdown`].
    pub async fn shutdown(&self) -> Result<(), ScoutError> {
        self.ticker.set_connection(None);
        if self.became_active.swap(false, Ordering::SeqCst) {
            instance::remove_exception_handler();
        }
        instance::clear_active(self.id);

        self.lifecycle.shutdown().await?;

        if !self.shutdown_event_published.swap(true, Ordering::SeqCst) {
            let _ = self.bus.send(EngineEvent::Shutdown);
        }
        self.log_sink.on_log(&LogRecord {
            level: tracing::Level::INFO,
            message: "scout_apm: engine shut down".into(),
        });
        Ok(())
    }

    /// `true` once a core agent connection is established.
    #[must_use]
    pub fn has_agent(&self) -> bool {
        self.tracing.get().is_some()
    }

    /// `true` once [`Self::shutdown`] has completed.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.lifecycle.is_shutdown()
    }

    /// Subscribe to this engine's event stream (spec §6).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    /// The frame's current request, if any (spec §6 `getCurrentRequest`).
    #[must_use]
    pub fn get_current_request(&self) -> Option<Arc<Request>> {
        scout_context::get_request()
    }

    /// The frame's current span, if any (spec §6 `getCurrentSpan`).
    #[must_use]
    pub fn get_current_span(&self) -> Option<Arc<Span>> {
        scout_context::get_span()
    }

    /// Asynchronous top-level transaction (spec §4.G `transaction`).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub async fn transaction<F, Fut, T>(&self, name: impl Into<String>, cb: F) -> Result<T, ScoutError>
    where
        F: FnOnce(TransactionHandle) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let tracing = self.require_tracing()?;
        Ok(self.run_transaction(tracing, name.into(), cb).await)
    }

    /// Like [`Self::transaction`], but first checks
    /// [`Self::ignores_path`]/`filterRequestPath` semantics for `path`
    /// (spec §4.G ignore handling for HTTP-shaped integrations).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub async fn transaction_for_path<F, Fut, T>(&self, path: &str, cb: F) -> Result<T, ScoutError>
    where
        F: FnOnce(TransactionHandle) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let tracing = self.require_tracing()?;
        let threshold = self.slow_request_threshold_ms;
        let tag_engine = tracing.clone();
        let result = tracing
            .transaction_for_path(path, move |handle| wrap_with_slow_tag(tag_engine, threshold, handle, cb))
            .await;
        Ok(result)
    }

    async fn run_transaction<F, Fut, T>(&self, tracing: TracingEngine, name: String, cb: F) -> T
    where
        F: FnOnce(TransactionHandle) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let threshold = self.slow_request_threshold_ms;
        let tag_engine = tracing.clone();
        tracing
            .transaction(name, move |handle| wrap_with_slow_tag(tag_engine, threshold, handle, cb))
            .await
    }

    /// Synchronous top-level transaction (spec §4.G `transactionSync`).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub fn transaction_sync<F, T>(&self, name: impl Into<String>, f: F) -> Result<T, ScoutError>
    where
        F: FnOnce(&Arc<Request>) -> T,
    {
        let tracing = self.require_tracing()?;
        let threshold = self.slow_request_threshold_ms;
        let result = tracing.transaction_sync(name, |request| {
            let started = std::time::Instant::now();
            let out = f(request);
            tag_if_slow_sync(&tracing, threshold, started, TagParent::Request { request_id: request.id.clone() });
            out
        });
        Ok(result)
    }

    /// Starts a child span of the current parent (spec §4.G `instrument`).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub async fn instrument<F, Fut, T>(&self, operation: impl Into<String>, cb: F) -> Result<T, ScoutError>
    where
        F: FnOnce(SpanContext) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let tracing = self.require_tracing()?;
        let threshold = self.slow_request_threshold_ms;
        let tag_engine = tracing.clone();
        let result = tracing
            .instrument(operation, move |ctx| wrap_span_with_slow_tag(tag_engine, threshold, ctx, cb))
            .await;
        Ok(result)
    }

    /// Synchronous child span (spec §4.G `instrumentSync`).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub fn instrument_sync<F, T>(
        &self,
        operation: impl Into<String>,
        f: F,
        parent_override: Option<SyncParent>,
    ) -> Result<T, ScoutError>
    where
        F: FnOnce(SpanContext) -> T,
    {
        let tracing = self.require_tracing()?;
        let threshold = self.slow_request_threshold_ms;
        let result = tracing.instrument_sync(
            operation,
            |ctx| {
                let started = std::time::Instant::now();
                let request_id = ctx.request_id.clone();
                let span_id = ctx.span_id.clone();
                let out = f(ctx);
                tag_if_slow_sync(&tracing, threshold, started, TagParent::Span { request_id, span_id });
                out
            },
            parent_override,
        );
        Ok(result)
    }

    /// Attach a tag to the current (or given) request/span (spec §4.G
    /// `addContext`).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub async fn add_context(
        &self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
        parent_override: Option<TagParent>,
    ) -> Result<(), ScoutError> {
        self.require_tracing()?.add_context(name, value, parent_override).await;
        Ok(())
    }

    /// `true` iff `path` matches a configured ignore prefix (spec §4.G
    /// `ignoresPath`).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub fn ignores_path(&self, path: &str) -> Result<bool, ScoutError> {
        Ok(self.require_tracing()?.ignores_path(path))
    }

    /// Applies the configured `uriReporting` mode to `path` (spec §4.G
    /// `filterRequestPath`).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NoAgentPresent`] if [`Self::setup`] has not completed.
    pub fn filter_request_path(&self, path: &str) -> Result<String, ScoutError> {
        Ok(self.require_tracing()?.filter_request_path(path))
    }

    fn require_tracing(&self) -> Result<TracingEngine, ScoutError> {
        self.tracing.get().cloned().ok_or_else(|| {
            ScoutError::new(ErrorCode::NoAgentPresent, "engine operation invoked before setup() completed")
        })
    }
}

async fn wrap_with_slow_tag<F, Fut, T>(
    tracing: TracingEngine,
    threshold_ms: Option<u64>,
    handle: TransactionHandle,
    cb: F,
) -> T
where
    F: FnOnce(TransactionHandle) -> Fut,
    Fut: Future<Output = T> + Send,
    T: Send,
{
    let request_id = handle.request.id.clone();
    let started = std::time::Instant::now();
    let out = cb(handle).await;
    if slow(threshold_ms, started) {
        tracing.add_context("slow", true, Some(TagParent::Request { request_id })).await;
    }
    out
}

async fn wrap_span_with_slow_tag<F, Fut, T>(
    tracing: TracingEngine,
    threshold_ms: Option<u64>,
    ctx: SpanContext,
    cb: F,
) -> T
where
    F: FnOnce(SpanContext) -> Fut,
    Fut: Future<Output = T> + Send,
    T: Send,
{
    let request_id = ctx.request_id.clone();
    let span_id = ctx.span_id.clone();
    let started = std::time::Instant::now();
    let out = cb(ctx).await;
    if slow(threshold_ms, started) {
        tracing.add_context("slow", true, Some(TagParent::Span { request_id, span_id })).await;
    }
    out
}

fn tag_if_slow_sync(tracing: &TracingEngine, threshold_ms: Option<u64>, started: std::time::Instant, parent: TagParent) {
    if slow(threshold_ms, started) {
        tracing.add_context_sync("slow", true, Some(parent));
    }
}

fn slow(threshold_ms: Option<u64>, started: std::time::Instant) -> bool {
    match threshold_ms {
        Some(ms) => started.elapsed().as_millis() as u64 >= ms,
        None => false,
    }
}
