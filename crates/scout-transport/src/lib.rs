// SPDX-License-Identifier: MIT OR Apache-2.0
//! scout-transport
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Socket transport to the core agent binary: connect over a Unix-domain
//! socket or TCP, send framed requests half-duplex, fire-and-forget sends,
//! and a connection-event stream. See spec §4.D.

pub mod connection;
pub mod error;
pub mod socket;

pub use connection::{AgentConnection, ConnectionEvent};
pub use error::TransportError;
pub use socket::{SocketTarget, probe_agent_exists, select_target};
