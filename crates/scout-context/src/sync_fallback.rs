// SPDX-License-Identifier: MIT OR Apache-2.0
//! Synchronous fallback fields (spec §4.F, §9 "Global state"): plain
//! process-global statics used by `*Sync` entry points when the caller
//! explicitly requests synchronous instrumentation and no async frame is
//! available. Writes are first-writer-wins in the sense spec §9 describes —
//! these are set at most once per synchronous call and are not expected to
//! race, so a plain `Mutex` (rather than anything lock-free) is enough.

use std::sync::{Arc, Mutex};

use crate::request::Request;
use crate::span::Span;

static SYNC_CURRENT_REQUEST: Mutex<Option<Arc<Request>>> = Mutex::new(None);
static SYNC_CURRENT_SPAN: Mutex<Option<Arc<Span>>> = Mutex::new(None);

/// `syncCurrentRequest` getter.
#[must_use]
pub fn sync_current_request() -> Option<Arc<Request>> {
    SYNC_CURRENT_REQUEST.lock().unwrap().clone()
}

/// `syncCurrentRequest` setter.
pub fn set_sync_current_request(request: Option<Arc<Request>>) {
    *SYNC_CURRENT_REQUEST.lock().unwrap() = request;
}

/// `syncCurrentSpan` getter.
#[must_use]
pub fn sync_current_span() -> Option<Arc<Span>> {
    SYNC_CURRENT_SPAN.lock().unwrap().clone()
}

/// `syncCurrentSpan` setter.
pub fn set_sync_current_span(span: Option<Arc<Span>>) {
    *SYNC_CURRENT_SPAN.lock().unwrap() = span;
}
