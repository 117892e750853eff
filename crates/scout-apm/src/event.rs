// SPDX-License-Identifier: MIT OR Apache-2.0
//! The facade's own event stream (spec §6): a union of the tracing engine's
//! events, the agent connection's events, and a `Shutdown` discriminator
//! that neither inner crate knows about.

use scout_transport::ConnectionEvent;

/// Events an [`crate::Engine`] subscriber observes.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// `shutdown()` completed.
    Shutdown,
    /// A request was successfully flushed (its `FinishRequest` was sent).
    RequestSent {
        /// The request's id.
        request_id: String,
    },
    /// [`crate::Engine::ignores_path`] matched a configured prefix.
    IgnoredPathDetected {
        /// The path that matched.
        path: String,
    },
    /// A request or span marked ignored skipped all wire emission.
    IgnoredRequestProcessingSkipped {
        /// The request's id.
        request_id: String,
    },
    /// Passthrough of the underlying agent connection's own event.
    Agent(ConnectionEvent),
}

impl From<scout_tracing::TracingEvent> for EngineEvent {
    fn from(event: scout_tracing::TracingEvent) -> Self {
        match event {
            scout_tracing::TracingEvent::RequestSent { request_id } => Self::RequestSent { request_id },
            scout_tracing::TracingEvent::IgnoredPathDetected { path } => Self::IgnoredPathDetected { path },
            scout_tracing::TracingEvent::IgnoredRequestProcessingSkipped { request_id } => {
                Self::IgnoredRequestProcessingSkipped { request_id }
            }
        }
    }
}
