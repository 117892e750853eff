// SPDX-License-Identifier: MIT OR Apache-2.0
//! A typed map of in-flight [`Request`]s and [`Span`]s, keyed by id, for a
//! churn-heavy set of short-lived requests/spans that come and go for the
//! lifetime of the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use scout_context::{Request, Span};

/// Tracks every [`Request`]/[`Span`] currently in flight, so
/// [`crate::TracingEngine::add_context`] and parent-lookup code can resolve
/// an id back to its live object.
#[derive(Default)]
pub struct RequestRegistry {
    requests: Mutex<HashMap<String, Arc<Request>>>,
    spans: Mutex<HashMap<String, Arc<Span>>>,
}

impl RequestRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request as in-flight.
    pub fn insert_request(&self, request: Arc<Request>) {
        self.requests.lock().unwrap().insert(request.id.clone(), request);
    }

    /// Look up an in-flight request by id.
    #[must_use]
    pub fn get_request(&self, id: &str) -> Option<Arc<Request>> {
        self.requests.lock().unwrap().get(id).cloned()
    }

    /// Remove a request once it has finished.
    pub fn remove_request(&self, id: &str) -> Option<Arc<Request>> {
        self.requests.lock().unwrap().remove(id)
    }

    /// Register a span as in-flight.
    pub fn insert_span(&self, span: Arc<Span>) {
        self.spans.lock().unwrap().insert(span.id.clone(), span);
    }

    /// Look up an in-flight span by id.
    #[must_use]
    pub fn get_span(&self, id: &str) -> Option<Arc<Span>> {
        self.spans.lock().unwrap().get(id).cloned()
    }

    /// Remove a span once it has finished.
    pub fn remove_span(&self, id: &str) -> Option<Arc<Span>> {
        self.spans.lock().unwrap().remove(id)
    }

    /// Number of requests currently in flight (diagnostic).
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of spans currently in flight (diagnostic).
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.spans.lock().unwrap().len()
    }
}
