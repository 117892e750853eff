// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Request` entity (spec §3): a top-level traced transaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A top-level traced transaction.
///
/// Identity (`req-<uuid-v4>`) is minted by whoever starts the request (the
/// tracing engine in `scout-tracing`); this type is a plain data carrier.
/// Lifecycle orchestration — firing `onStop`, flushing `FinishRequest` and
/// accumulated tags/spans — lives in the engine that holds the transport
/// connection, not here, so this crate never depends on `scout-transport`.
#[derive(Debug)]
pub struct Request {
    /// `req-<uuid-v4>`.
    pub id: String,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    ended_at: Mutex<Option<DateTime<Utc>>>,
    tags: Mutex<Vec<(String, Value)>>,
    span_ids: Mutex<Vec<String>>,
    ignored: AtomicBool,
}

impl Request {
    /// Start a new, running request.
    #[must_use]
    pub fn new(id: impl Into<String>, started_at: DateTime<Utc>, ignored: bool) -> Self {
        Self {
            id: id.into(),
            started_at,
            ended_at: Mutex::new(None),
            tags: Mutex::new(Vec::new()),
            span_ids: Mutex::new(Vec::new()),
            ignored: AtomicBool::new(ignored),
        }
    }

    /// `true` once [`Self::stop`] has recorded an end time.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.ended_at.lock().unwrap().is_some()
    }

    /// Record the end time, if not already stopped.
    ///
    /// Returns `false` if this request was already stopped, so a caller can
    /// treat a second `stop` as a no-op rather than double-flushing.
    pub fn stop(&self, at: DateTime<Utc>) -> bool {
        let mut ended = self.ended_at.lock().unwrap();
        if ended.is_some() {
            return false;
        }
        *ended = Some(at);
        true
    }

    /// The end time, if stopped.
    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        *self.ended_at.lock().unwrap()
    }

    /// Attach a tag. Spec: "string → JSON value or array thereof"; callers
    /// pass any [`serde_json::Value`], including arrays.
    pub fn add_tag(&self, name: impl Into<String>, value: Value) {
        self.tags.lock().unwrap().push((name.into(), value));
    }

    /// Tags recorded so far, in insertion order.
    #[must_use]
    pub fn tags(&self) -> Vec<(String, Value)> {
        self.tags.lock().unwrap().clone()
    }

    /// Record a child span's id, preserving start order.
    pub fn record_span(&self, span_id: impl Into<String>) {
        self.span_ids.lock().unwrap().push(span_id.into());
    }

    /// Child span ids, in the order they started.
    #[must_use]
    pub fn span_ids(&self) -> Vec<String> {
        self.span_ids.lock().unwrap().clone()
    }

    /// Whether this request (and everything under it) is excluded from wire
    /// emission (spec §4.G ignore semantics).
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap()
    }

    #[test]
    fn stop_is_idempotent() {
        let req = Request::new("req-1", ts(), false);
        assert!(req.stop(ts()));
        assert!(!req.stop(ts()));
        assert!(req.is_stopped());
    }

    #[test]
    fn tags_and_spans_preserve_insertion_order() {
        let req = Request::new("req-1", ts(), false);
        req.add_tag("b", Value::from(2));
        req.add_tag("a", Value::from(1));
        assert_eq!(
            req.tags(),
            vec![("b".to_string(), Value::from(2)), ("a".to_string(), Value::from(1))]
        );

        req.record_span("span-2");
        req.record_span("span-1");
        assert_eq!(req.span_ids(), vec!["span-2", "span-1"]);
    }

    #[test]
    fn ignored_flag_is_fixed_at_construction() {
        assert!(Request::new("req-1", ts(), true).is_ignored());
        assert!(!Request::new("req-2", ts(), false).is_ignored());
    }
}
