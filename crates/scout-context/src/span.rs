// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Span` entity (spec §3): a nested, timed sub-operation within a
//! [`crate::Request`].

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A nested, timed operation within a request.
///
/// Children are not stored directly; parenthood is recorded by `parent_id`
/// alone, per spec's data model.
#[derive(Debug)]
pub struct Span {
    /// `span-<uuid-v4>`.
    pub id: String,
    /// The request this span belongs to.
    pub request_id: String,
    /// Parent span id, if nested under another span. `None` means the
    /// request itself is the parent.
    pub parent_id: Option<String>,
    /// Operation name.
    pub operation: String,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    ended_at: Mutex<Option<DateTime<Utc>>>,
    tags: Mutex<Vec<(String, Value)>>,
    ignored: bool,
}

impl Span {
    /// Start a new, running span. `ignored` is captured once here, inherited
    /// from the owning request at creation time — it never changes after.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        request_id: impl Into<String>,
        parent_id: Option<String>,
        operation: impl Into<String>,
        started_at: DateTime<Utc>,
        ignored: bool,
    ) -> Self {
        Self {
            id: id.into(),
            request_id: request_id.into(),
            parent_id,
            operation: operation.into(),
            started_at,
            ended_at: Mutex::new(None),
            tags: Mutex::new(Vec::new()),
            ignored,
        }
    }

    /// `true` once [`Self::stop`] has recorded an end time.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.ended_at.lock().unwrap().is_some()
    }

    /// Record the end time, if not already stopped; `false` if it already
    /// was.
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

    /// Attach a tag.
    pub fn add_tag(&self, name: impl Into<String>, value: Value) {
        self.tags.lock().unwrap().push((name.into(), value));
    }

    /// Tags recorded so far, in insertion order.
    #[must_use]
    pub fn tags(&self) -> Vec<(String, Value)> {
        self.tags.lock().unwrap().clone()
    }

    /// Inherited from the owning request at construction.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }
}
