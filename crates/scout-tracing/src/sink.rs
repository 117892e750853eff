// SPDX-License-Identifier: MIT OR Apache-2.0
//! The transport-facing capability boundary the tracing engine flushes
//! through — a typed `async_trait` seam letting tests substitute a mock
//! without a real socket.

use async_trait::async_trait;

use scout_error::ScoutError;
use scout_protocol::{AgentRequest, AgentResponse};
use scout_transport::AgentConnection;

/// Where the tracing engine sends framed messages. Implemented for
/// [`AgentConnection`]; tests implement it directly over an in-memory log.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Send `request` and await the agent's response.
    async fn send(&self, request: AgentRequest) -> Result<AgentResponse, ScoutError>;

    /// Enqueue `request` for fire-and-forget delivery, preserving submission
    /// order.
    async fn send_async(&self, request: AgentRequest) -> Result<(), ScoutError>;
}

#[async_trait]
impl Sink for AgentConnection {
    async fn send(&self, request: AgentRequest) -> Result<AgentResponse, ScoutError> {
        AgentConnection::send(self, request).await.map_err(ScoutError::from)
    }

    async fn send_async(&self, request: AgentRequest) -> Result<(), ScoutError> {
        AgentConnection::send_async(self, request).await.map_err(ScoutError::from)
    }
}
