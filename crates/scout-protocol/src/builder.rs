// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builder patterns for constructing [`AgentRequest`] variants ergonomically.
//!
//! # Examples
//!
//! ```
//! use scout_protocol::builder::AgentRequestBuilder;
//!
//! let request = AgentRequestBuilder::register("demo", "K", "1.0");
//! ```

use chrono::{DateTime, Utc};

use crate::AgentRequest;

/// Entry point for building [`AgentRequest`] variants.
pub struct AgentRequestBuilder;

impl AgentRequestBuilder {
    /// Build a `Register` request.
    #[must_use]
    pub fn register(app: impl Into<String>, key: impl Into<String>, api_version: impl Into<String>) -> AgentRequest {
        AgentRequest::Register {
            app: app.into(),
            key: key.into(),
            api_version: api_version.into(),
        }
    }

    /// Build an `ApplicationEvent` request.
    #[must_use]
    pub fn application_event(
        event_value: impl Into<serde_json::Value>,
        event_type: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> AgentRequest {
        AgentRequest::ApplicationEvent {
            event_value: event_value.into(),
            event_type: event_type.into(),
            source: source.into(),
            timestamp,
        }
    }

    /// Build a `StartRequest` request.
    #[must_use]
    pub fn start_request(request_id: impl Into<String>, timestamp: DateTime<Utc>) -> AgentRequest {
        AgentRequest::StartRequest {
            request_id: request_id.into(),
            timestamp,
        }
    }

    /// Build a `FinishRequest` request.
    #[must_use]
    pub fn finish_request(request_id: impl Into<String>, timestamp: DateTime<Utc>) -> AgentRequest {
        AgentRequest::FinishRequest {
            request_id: request_id.into(),
            timestamp,
        }
    }

    /// Build a `TagRequest` request.
    #[must_use]
    pub fn tag_request(
        request_id: impl Into<String>,
        tag: impl Into<String>,
        value: impl Into<serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> AgentRequest {
        AgentRequest::TagRequest {
            request_id: request_id.into(),
            tag: tag.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Start building a `StartSpan` request via [`StartSpanBuilder`].
    #[must_use]
    pub fn start_span(
        request_id: impl Into<String>,
        span_id: impl Into<String>,
        operation: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> StartSpanBuilder {
        StartSpanBuilder {
            request_id: request_id.into(),
            span_id: span_id.into(),
            operation: operation.into(),
            timestamp,
            parent_id: None,
        }
    }

    /// Build a `StopSpan` request.
    #[must_use]
    pub fn stop_span(
        request_id: impl Into<String>,
        span_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> AgentRequest {
        AgentRequest::StopSpan {
            request_id: request_id.into(),
            span_id: span_id.into(),
            timestamp,
        }
    }

    /// Build a `TagSpan` request.
    #[must_use]
    pub fn tag_span(
        request_id: impl Into<String>,
        span_id: impl Into<String>,
        tag: impl Into<String>,
        value: impl Into<serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> AgentRequest {
        AgentRequest::TagSpan {
            request_id: request_id.into(),
            span_id: span_id.into(),
            tag: tag.into(),
            value: value.into(),
            timestamp,
        }
    }
}

/// Sub-builder for `StartSpan`, which has one optional field (`parent_id`).
pub struct StartSpanBuilder {
    request_id: String,
    span_id: String,
    operation: String,
    timestamp: DateTime<Utc>,
    parent_id: Option<String>,
}

impl StartSpanBuilder {
    /// Set the parent span identifier for a nested span.
    #[must_use]
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Finish building the `StartSpan` request.
    #[must_use]
    pub fn build(self) -> AgentRequest {
        AgentRequest::StartSpan {
            request_id: self.request_id,
            span_id: self.span_id,
            parent_id: self.parent_id,
            operation: self.operation,
            timestamp: self.timestamp,
        }
    }
}
