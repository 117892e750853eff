// SPDX-License-Identifier: MIT OR Apache-2.0
//! scout-protocol
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Wire format for talking to the core agent binary.
//! Transport: a 4-byte big-endian length prefix followed by a UTF-8 JSON
//! object, carried over either a Unix-domain socket or a TCP connection (see
//! `scout-transport`).

pub mod builder;
pub mod codec;
mod timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use codec::FramedCodec;

/// Maximum frame body size the codec will accept before decoding, guarding
/// against a corrupt or hostile length prefix allocating unbounded memory.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Errors arising from encoding/decoding a frame or its JSON body.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization or deserialization failure.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The declared frame length exceeded [`MAX_FRAME_LEN`].
    #[error("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge {
        /// The declared frame length, in bytes.
        len: u32,
    },
}

/// Requests the instrumentation core emits to the agent.
///
/// Tagged on the wire by a `type` discriminator whose value is exactly the
/// variant name (`"Register"`, `"StartSpan"`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentRequest {
    /// First message sent on a new connection, announcing the application.
    Register {
        /// Application name.
        app: String,
        /// Account/application key.
        key: String,
        /// Wire protocol version this core speaks.
        api_version: String,
    },

    /// A standalone application-level event, outside any request/span.
    ApplicationEvent {
        /// Event payload.
        event_value: serde_json::Value,
        /// Event type/category.
        event_type: String,
        /// Source that produced the event.
        source: String,
        /// Event time.
        #[serde(with = "crate::timestamp::millis")]
        timestamp: DateTime<Utc>,
    },

    /// Marks the start of a traced request.
    StartRequest {
        /// Request identifier.
        request_id: String,
        /// Start time.
        #[serde(with = "crate::timestamp::millis")]
        timestamp: DateTime<Utc>,
    },

    /// Marks the end of a traced request.
    FinishRequest {
        /// Request identifier.
        request_id: String,
        /// End time.
        #[serde(with = "crate::timestamp::millis")]
        timestamp: DateTime<Utc>,
    },

    /// Attaches a tag to a request.
    TagRequest {
        /// Request identifier.
        request_id: String,
        /// Tag name.
        tag: String,
        /// Tag value.
        value: serde_json::Value,
        /// Tag time.
        #[serde(with = "crate::timestamp::millis")]
        timestamp: DateTime<Utc>,
    },

    /// Marks the start of a span within a request.
    StartSpan {
        /// Request identifier this span belongs to.
        request_id: String,
        /// Span identifier.
        span_id: String,
        /// Parent span identifier, if nested.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        parent_id: Option<String>,
        /// Operation name.
        operation: String,
        /// Start time.
        #[serde(with = "crate::timestamp::millis")]
        timestamp: DateTime<Utc>,
    },

    /// Marks the end of a span.
    StopSpan {
        /// Request identifier this span belongs to.
        request_id: String,
        /// Span identifier.
        span_id: String,
        /// End time.
        #[serde(with = "crate::timestamp::millis")]
        timestamp: DateTime<Utc>,
    },

    /// Attaches a tag to a span.
    TagSpan {
        /// Request identifier this span belongs to.
        request_id: String,
        /// Span identifier.
        span_id: String,
        /// Tag name.
        tag: String,
        /// Tag value.
        value: serde_json::Value,
        /// Tag time.
        #[serde(with = "crate::timestamp::millis")]
        timestamp: DateTime<Utc>,
    },
}

impl AgentRequest {
    /// The wire discriminator for this request, e.g. `"StartSpan"`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "Register",
            Self::ApplicationEvent { .. } => "ApplicationEvent",
            Self::StartRequest { .. } => "StartRequest",
            Self::FinishRequest { .. } => "FinishRequest",
            Self::TagRequest { .. } => "TagRequest",
            Self::StartSpan { .. } => "StartSpan",
            Self::StopSpan { .. } => "StopSpan",
            Self::TagSpan { .. } => "TagSpan",
        }
    }
}

/// Outcome carried by every [`AgentResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentResult {
    /// The request was accepted.
    Success,
    /// The request was rejected.
    Failure,
}

/// Responses the agent sends back, one per [`AgentRequest`].
///
/// An `Unknown` variant absorbs any payload that doesn't match the standard
/// `{type, result}` envelope shape; per spec the caller only needs `result`
/// to decide success, regardless of whether the discriminator is one this
/// build recognises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentResponse {
    /// A response matching the standard envelope shape.
    Known {
        /// Matching request discriminator.
        #[serde(rename = "type")]
        type_name: String,
        /// Outcome.
        result: AgentResult,
        /// Optional human-readable detail, typically present on failure.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        message: Option<String>,
    },
    /// A response whose discriminator (or shape) this build does not
    /// recognise. Still carries `result`, which is all callers need.
    Unknown(serde_json::Value),
}

impl AgentResponse {
    /// Whether this response indicates success.
    ///
    /// For [`Self::Unknown`] payloads, looks for a top-level `"result"`
    /// field equal to `"Success"`, matching spec's "treat unknown
    /// discriminators as success iff `result == Success`" rule.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::Known { result, .. } => matches!(result, AgentResult::Success),
            Self::Unknown(v) => v.get("result").and_then(|r| r.as_str()) == Some("Success"),
        }
    }
}
