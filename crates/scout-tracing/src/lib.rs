// SPDX-License-Identifier: MIT OR Apache-2.0
//! scout-tracing
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The request/span tracing engine (spec §4.G): start/stop requests and
//! spans, enforce parent/child ordering, filter/ignore paths, and flush
//! framed telemetry to the core agent through a [`Sink`] with at-most-once,
//! error-isolated delivery.

pub mod bus;
pub mod config;
pub mod registry;
pub mod scrub;
pub mod sink;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use scout_context::{Request, Span};
use scout_protocol::builder::AgentRequestBuilder;
use uuid::Uuid;

pub use bus::{EventBus, TracingEvent};
pub use config::TracingConfig;
pub use registry::RequestRegistry;
pub use sink::Sink;

/// A reference to either a request or a span, for [`TracingEngine::add_context`]'s
/// `parentOverride` parameter.
#[derive(Debug, Clone)]
pub enum TagParent {
    /// Attach the tag to a request.
    Request {
        /// The request's id.
        request_id: String,
    },
    /// Attach the tag to a span.
    Span {
        /// The span's owning request id.
        request_id: String,
        /// The span's id.
        span_id: String,
    },
}

/// A reference to either a live request or span, for
/// [`TracingEngine::instrument_sync`]'s `parentOverride` parameter.
pub enum SyncParent {
    /// Start the child span under this request.
    Request(Arc<Request>),
    /// Start the child span under this span.
    Span(Arc<Span>),
}

/// The request/span identity visible inside an [`TracingEngine::instrument`]
/// or [`TracingEngine::instrument_sync`] callback.
#[derive(Debug, Clone)]
pub struct SpanContext {
    /// The owning request's id.
    pub request_id: String,
    /// This span's id.
    pub span_id: String,
    /// The parent span's id, if nested under another span rather than
    /// directly under the request.
    pub parent_id: Option<String>,
}

/// The handle passed to a [`TracingEngine::transaction`] callback: the
/// request it started, plus an explicit early-finish hook (spec's `done`).
#[derive(Clone)]
pub struct TransactionHandle {
    /// The request this transaction started.
    pub request: Arc<Request>,
    engine: TracingEngine,
}

impl TransactionHandle {
    /// Finish the request now. Idempotent: a second call (or the engine's
    /// own implicit finish once the transaction's callback resolves) is a
    /// no-op.
    pub async fn done(&self) {
        self.engine.finish_request(&self.request).await;
    }
}

/// The request/span tracing engine (spec §4.G).
///
/// Cheap to clone: every field is itself a handle (`Arc`, or a
/// `tokio::sync::broadcast::Sender` clone) rather than owned state, the same
/// way `AgentConnection` and `EventBus` are handles — so nested async blocks
/// that need their own owned copy (e.g. spawned background flushes for the
/// `*Sync` entry points) just clone the engine instead of borrowing it.
#[derive(Clone)]
pub struct TracingEngine {
    sink: Arc<dyn Sink>,
    config: TracingConfig,
    registry: Arc<RequestRegistry>,
    bus: EventBus,
}

impl TracingEngine {
    /// Build an engine that flushes through `sink`, honoring `config`'s
    /// ignore list and URI reporting mode.
    #[must_use]
    pub fn new(sink: Arc<dyn Sink>, config: TracingConfig) -> Self {
        Self {
            sink,
            config,
            registry: Arc::new(RequestRegistry::new()),
            bus: EventBus::new(),
        }
    }

    /// Subscribe to [`TracingEvent`]s.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TracingEvent> {
        self.bus.subscribe()
    }

    /// Number of requests/spans currently in flight (diagnostic).
    #[must_use]
    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    // -- Ignore / URI filtering -------------------------------------------

    /// `true` iff any configured `ignore` prefix is a prefix of `path`.
    /// Emits [`TracingEvent::IgnoredPathDetected`] when true.
    pub fn ignores_path(&self, path: &str) -> bool {
        let ignored = self.config.ignore.iter().any(|prefix| path.starts_with(prefix.as_str()));
        if ignored {
            self.bus.publish(TracingEvent::IgnoredPathDetected { path: path.to_string() });
        }
        ignored
    }

    /// Dispatch on the configured URI reporting mode.
    #[must_use]
    pub fn filter_request_path(&self, path: &str) -> String {
        match self.config.uri_reporting {
            scout_config::UriReporting::FilteredParams => scrub::scrub_path_params(path),
            scout_config::UriReporting::Path => scrub::scrub_path(path),
            scout_config::UriReporting::None => path.to_string(),
        }
    }

    // -- transaction / transaction_sync ------------------------------------

    /// Asynchronous top-level transaction. Creates a fresh async frame,
    /// starts a new request, sets it as current, and invokes `cb` with a
    /// [`TransactionHandle`]. The request is finished (flushed) once `cb`'s
    /// future resolves, or earlier if `cb` calls [`TransactionHandle::done`].
    pub async fn transaction<F, Fut, T>(&self, _name: impl Into<String>, cb: F) -> T
    where
        F: FnOnce(TransactionHandle) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        self.transaction_impl(false, cb).await
    }

    /// Like [`Self::transaction`], but `path` is first checked against the
    /// ignore list: a matching request still runs `cb`, but emits no wire
    /// messages (spec §4.G ignore semantics).
    pub async fn transaction_for_path<F, Fut, T>(&self, path: &str, cb: F) -> T
    where
        F: FnOnce(TransactionHandle) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let ignored = self.ignores_path(path);
        self.transaction_impl(ignored, cb).await
    }

    async fn transaction_impl<F, Fut, T>(&self, ignored: bool, cb: F) -> T
    where
        F: FnOnce(TransactionHandle) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let engine = self.clone();
        scout_context::run_in_new_frame(move || async move {
            let id = format!("req-{}", Uuid::new_v4());
            let request = Arc::new(Request::new(id.clone(), Utc::now(), ignored));
            engine.registry.insert_request(Arc::clone(&request));
            scout_context::set_request(Some(Arc::clone(&request)));

            if ignored {
                engine.bus.publish(TracingEvent::IgnoredRequestProcessingSkipped { request_id: id });
            } else {
                engine.send_start_request(&request).await;
            }

            let handle = TransactionHandle {
                request: Arc::clone(&request),
                engine: engine.clone(),
            };
            let result = cb(handle).await;
            engine.finish_request(&request).await;
            result
        })
        .await
    }

    /// Synchronous variant: starts and stops the request inline around `f`,
    /// using the sync fallback fields instead of the async frame.
    ///
    /// The wire flush for this request is fired via `tokio::spawn` rather
    /// than awaited in line with `f` — see DESIGN.md for why the `*Sync`
    /// fallback path relaxes spec's strict per-connection FIFO ordering
    /// guarantee (§5 invariant 3) to per-request ordering only.
    pub fn transaction_sync<F, T>(&self, _name: impl Into<String>, f: F) -> T
    where
        F: FnOnce(&Arc<Request>) -> T,
    {
        let id = format!("req-{}", Uuid::new_v4());
        let request = Arc::new(Request::new(id, Utc::now(), false));
        self.registry.insert_request(Arc::clone(&request));
        scout_context::set_sync_current_request(Some(Arc::clone(&request)));

        let engine = self.clone();
        let start_req = Arc::clone(&request);
        tokio::spawn(async move {
            engine.send_start_request(&start_req).await;
        });

        let result = f(&request);

        let engine = self.clone();
        let fin_req = Arc::clone(&request);
        tokio::spawn(async move {
            engine.finish_request(&fin_req).await;
        });
        scout_context::set_sync_current_span(None);
        scout_context::set_sync_current_request(None);
        result
    }

    // -- instrument / instrument_sync --------------------------------------

    /// Starts a child span of the current parent (span if any, else
    /// request). If no parent is present, auto-creates a `transaction`
    /// wrapping this `instrument` and finishes both together.
    pub async fn instrument<F, Fut, T>(&self, operation: impl Into<String>, cb: F) -> T
    where
        F: FnOnce(SpanContext) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let operation = operation.into();
        if scout_context::get_request().is_none() && scout_context::get_span().is_none() {
            let op = operation.clone();
            return self
                .transaction(operation, move |txn| async move {
                    let result = self.instrument_body(op, cb).await;
                    txn.done().await;
                    result
                })
                .await;
        }
        self.instrument_body(operation, cb).await
    }

    async fn instrument_body<F, Fut, T>(&self, operation: String, cb: F) -> T
    where
        F: FnOnce(SpanContext) -> Fut,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let engine = self.clone();
        scout_context::run_in_new_frame(move || async move {
            let request = scout_context::get_request()
                .expect("instrument always runs with a request already current");
            let parent_span = scout_context::get_span();
            let parent_id = parent_span.as_ref().map(|s| s.id.clone());

            let span_id = format!("span-{}", Uuid::new_v4());
            let span = Arc::new(Span::new(
                span_id.clone(),
                request.id.clone(),
                parent_id.clone(),
                operation,
                Utc::now(),
                request.is_ignored(),
            ));
            request.record_span(span_id.clone());
            engine.registry.insert_span(Arc::clone(&span));
            scout_context::set_span(Some(Arc::clone(&span)));

            engine.send_start_span(&request, &span).await;

            let ctx = SpanContext {
                request_id: request.id.clone(),
                span_id: span_id.clone(),
                parent_id,
            };
            let result = cb(ctx).await;

            engine.finish_span(&request, &span).await;
            engine.registry.remove_span(&span_id);
            result
        })
        .await
    }

    /// Synchronous variant. Prefers `parent_override` → `syncCurrentSpan` →
    /// `syncCurrentRequest` → the async frame's current span → the async
    /// frame's current request; auto-creates a [`Self::transaction_sync`] if
    /// none is available.
    pub fn instrument_sync<F, T>(&self, operation: impl Into<String>, f: F, parent_override: Option<SyncParent>) -> T
    where
        F: FnOnce(SpanContext) -> T,
    {
        let operation = operation.into();

        let parent = parent_override
            .or_else(|| scout_context::sync_current_span().map(SyncParent::Span))
            .or_else(|| scout_context::sync_current_request().map(SyncParent::Request))
            .or_else(|| scout_context::get_span().map(SyncParent::Span))
            .or_else(|| scout_context::get_request().map(SyncParent::Request));

        match parent {
            None => {
                let op = operation.clone();
                self.transaction_sync(operation, move |request| {
                    self.instrument_sync_body(op, Arc::clone(request), None, f)
                })
            }
            Some(SyncParent::Request(request)) => self.instrument_sync_body(operation, request, None, f),
            Some(SyncParent::Span(span)) => {
                let request = self
                    .registry
                    .get_request(&span.request_id)
                    .unwrap_or_else(|| Arc::new(Request::new(span.request_id.clone(), span.started_at, span.is_ignored())));
                self.instrument_sync_body(operation, request, Some(span), f)
            }
        }
    }

    fn instrument_sync_body<F, T>(
        &self,
        operation: String,
        request: Arc<Request>,
        parent_span: Option<Arc<Span>>,
        f: F,
    ) -> T
    where
        F: FnOnce(SpanContext) -> T,
    {
        let parent_id = parent_span.as_ref().map(|s| s.id.clone());
        let span_id = format!("span-{}", Uuid::new_v4());
        let span = Arc::new(Span::new(
            span_id.clone(),
            request.id.clone(),
            parent_id.clone(),
            operation,
            Utc::now(),
            request.is_ignored(),
        ));
        request.record_span(span_id.clone());
        self.registry.insert_span(Arc::clone(&span));
        scout_context::set_sync_current_span(Some(Arc::clone(&span)));

        let engine = self.clone();
        let start_req = Arc::clone(&request);
        let start_span = Arc::clone(&span);
        tokio::spawn(async move {
            engine.send_start_span(&start_req, &start_span).await;
        });

        let ctx = SpanContext {
            request_id: request.id.clone(),
            span_id: span_id.clone(),
            parent_id,
        };
        let result = f(ctx);

        let engine = self.clone();
        let fin_req = Arc::clone(&request);
        let fin_span = Arc::clone(&span);
        tokio::spawn(async move {
            engine.finish_span(&fin_req, &fin_span).await;
        });
        self.registry.remove_span(&span_id);
        scout_context::set_sync_current_span(None);
        result
    }

    // -- addContext ---------------------------------------------------------

    /// Attach a tag to the current (or given) request/span. Flushed
    /// immediately as `TagRequest`/`TagSpan` (spec: "asynchronously
    /// flushed").
    pub async fn add_context(&self, name: impl Into<String>, value: impl Into<serde_json::Value>, parent_override: Option<TagParent>) {
        let name = name.into();
        let value = value.into();

        let parent = parent_override.or_else(|| {
            scout_context::get_span()
                .map(|s| TagParent::Span {
                    request_id: s.request_id.clone(),
                    span_id: s.id.clone(),
                })
                .or_else(|| scout_context::get_request().map(|r| TagParent::Request { request_id: r.id.clone() }))
        });

        let Some(parent) = parent else {
            tracing::warn!("scout_apm: add_context called with no current request or span");
            return;
        };

        match parent {
            TagParent::Request { request_id } => {
                let ignored = self
                    .registry
                    .get_request(&request_id)
                    .map(|r| {
                        r.add_tag(name.clone(), value.clone());
                        r.is_ignored()
                    })
                    .unwrap_or(false);
                if ignored {
                    return;
                }
                self.send_and_log(AgentRequestBuilder::tag_request(request_id, name, value, Utc::now()))
                    .await;
            }
            TagParent::Span { request_id, span_id } => {
                let ignored = self
                    .registry
                    .get_span(&span_id)
                    .map(|s| {
                        s.add_tag(name.clone(), value.clone());
                        s.is_ignored()
                    })
                    .unwrap_or(false);
                if ignored {
                    return;
                }
                self.send_and_log(AgentRequestBuilder::tag_span(request_id, span_id, name, value, Utc::now()))
                    .await;
            }
        }
    }

    /// Synchronous variant of [`Self::add_context`]: resolves and records the
    /// tag immediately (frame reads are non-blocking), then flushes the wire
    /// send in the background via `tokio::spawn`, mirroring
    /// [`Self::transaction_sync`]/[`Self::instrument_sync`]'s documented FIFO
    /// relaxation. Used by the process-wide exception handler (spec §4.E
    /// step 5), which runs inside a panic hook and cannot `.await`.
    pub fn add_context_sync(&self, name: impl Into<String>, value: impl Into<serde_json::Value>, parent_override: Option<TagParent>) {
        let name = name.into();
        let value = value.into();

        let parent = parent_override.or_else(|| {
            scout_context::get_span()
                .map(|s| TagParent::Span {
                    request_id: s.request_id.clone(),
                    span_id: s.id.clone(),
                })
                .or_else(|| scout_context::get_request().map(|r| TagParent::Request { request_id: r.id.clone() }))
        });

        let Some(parent) = parent else {
            tracing::warn!("scout_apm: add_context_sync called with no current request or span");
            return;
        };

        match parent {
            TagParent::Request { request_id } => {
                let ignored = self
                    .registry
                    .get_request(&request_id)
                    .map(|r| {
                        r.add_tag(name.clone(), value.clone());
                        r.is_ignored()
                    })
                    .unwrap_or(false);
                if ignored {
                    return;
                }
                let engine = self.clone();
                tokio::spawn(async move {
                    engine.send_and_log(AgentRequestBuilder::tag_request(request_id, name, value, Utc::now())).await;
                });
            }
            TagParent::Span { request_id, span_id } => {
                let ignored = self
                    .registry
                    .get_span(&span_id)
                    .map(|s| {
                        s.add_tag(name.clone(), value.clone());
                        s.is_ignored()
                    })
                    .unwrap_or(false);
                if ignored {
                    return;
                }
                let engine = self.clone();
                tokio::spawn(async move {
                    engine.send_and_log(AgentRequestBuilder::tag_span(request_id, span_id, name, value, Utc::now())).await;
                });
            }
        }
    }

    // -- internals ------------------------------------------------------

    async fn finish_request(&self, request: &Arc<Request>) {
        if !request.stop(Utc::now()) {
            return;
        }
        self.registry.remove_request(&request.id);
        if request.is_ignored() {
            return;
        }
        let ts = request.ended_at().unwrap_or_else(Utc::now);
        self.send_and_log(AgentRequestBuilder::finish_request(request.id.clone(), ts)).await;
        self.bus.publish(TracingEvent::RequestSent { request_id: request.id.clone() });
    }

    async fn finish_span(&self, request: &Arc<Request>, span: &Arc<Span>) {
        if !span.stop(Utc::now()) {
            return;
        }
        if request.is_ignored() {
            return;
        }
        let ts = span.ended_at().unwrap_or_else(Utc::now);
        self.send_and_log(AgentRequestBuilder::stop_span(request.id.clone(), span.id.clone(), ts))
            .await;
    }

    async fn send_start_request(&self, request: &Request) {
        self.send_and_log(AgentRequestBuilder::start_request(request.id.clone(), request.started_at))
            .await;
    }

    async fn send_start_span(&self, request: &Request, span: &Span) {
        let mut builder =
            AgentRequestBuilder::start_span(request.id.clone(), span.id.clone(), span.operation.clone(), span.started_at);
        if let Some(parent_id) = &span.parent_id {
            builder = builder.parent(parent_id.clone());
        }
        self.send_and_log(builder.build()).await;
    }

    /// Error isolation (spec §4.G): a failed send is logged and swallowed,
    /// never propagated into a caller's `instrument`/`transaction` closure.
    ///
    /// Also the single choke point for spec §7's `MonitoringDisabled`: every
    /// wire send `transaction`/`instrument`/`add_context` would make funnels
    /// through here, so disabling `monitor` swallows them all uniformly
    /// without the caller's request/span bookkeeping or callback noticing.
    async fn send_and_log(&self, request: scout_protocol::AgentRequest) {
        if !self.config.monitor {
            tracing::warn!(
                error_code = ?scout_error::ErrorCode::MonitoringDisabled,
                "scout_apm: monitoring disabled, dropping a tracing message"
            );
            return;
        }
        if let Err(e) = self.sink.send_async(request).await {
            tracing::warn!(error = %e, "scout_apm: failed to flush a tracing message");
        }
    }
}
