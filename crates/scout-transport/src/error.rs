// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for agent socket transport.

use thiserror::Error;

/// Errors from connecting to, or exchanging frames with, the core agent.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured endpoint could not be reached.
    #[error("failed to connect to core agent at {endpoint}: {source}")]
    ConnectionFailed {
        /// The endpoint that was attempted.
        endpoint: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted on a connection that is not connected.
    #[error("not connected to the core agent")]
    Disconnected,

    /// `socketPath` did not resolve to a recognised scheme.
    #[error("unrecognised socket scheme: {0}")]
    UnknownSocketType(String),

    /// `stopProcess` was called without `allowShutdown` set.
    #[error("stopProcess requires allowShutdown to be enabled")]
    ShutdownNotAllowed,

    /// Underlying codec (framing/JSON) failure.
    #[error(transparent)]
    Protocol(#[from] scout_protocol::ProtocolError),

    /// The background connection task was dropped before it could reply.
    #[error("connection task ended before a response arrived")]
    ConnectionTaskGone,
}

impl From<TransportError> for scout_error::ScoutError {
    fn from(err: TransportError) -> Self {
        use scout_error::ErrorCode;
        let code = match &err {
            TransportError::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            TransportError::Disconnected | TransportError::ConnectionTaskGone => {
                ErrorCode::Disconnected
            }
            TransportError::UnknownSocketType(_) => ErrorCode::UnknownSocketType,
            TransportError::ShutdownNotAllowed => ErrorCode::NotSupported,
            TransportError::Protocol(_) => ErrorCode::ConnectionFailed,
        };
        scout_error::ScoutError::new(code, err.to_string()).with_source(err)
    }
}
