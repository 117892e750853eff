// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket target selection and agent-existence probing, per spec §4.D/§6.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::TransportError;

/// Default TCP endpoint used once the core agent speaks version ≥ 1.3.0.
pub const DEFAULT_TCP_ADDR: &str = "127.0.0.1:6590";

/// Resolved transport endpoint for an [`crate::AgentConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketTarget {
    /// Connect over a Unix-domain socket at this path.
    Unix(PathBuf),
    /// Connect over TCP to this address.
    Tcp(SocketAddr),
}

/// Choose a [`SocketTarget`] per spec §4.D:
///
/// - If `explicit_socket_path` was set by the embedder (via `Env` or
///   `Node` — never `Derived`/`Default`), use it literally: `tcp://host:port`
///   selects TCP, anything else is a filesystem path (Unix).
/// - Otherwise, core agent version < 1.3.0 uses `derived_unix_path` (the
///   `scout-config` Derived fallback for `socketPath`); ≥ 1.3.0 uses the
///   default TCP endpoint, ignoring the derived Unix path entirely.
pub fn select_target(
    explicit_socket_path: Option<&str>,
    derived_unix_path: Option<&str>,
    core_agent_version: &str,
) -> Result<SocketTarget, TransportError> {
    if let Some(path) = explicit_socket_path {
        return parse_explicit(path);
    }
    if version_at_least(core_agent_version, (1, 3, 0)) {
        let addr = DEFAULT_TCP_ADDR
            .parse()
            .expect("DEFAULT_TCP_ADDR is a valid socket address");
        Ok(SocketTarget::Tcp(addr))
    } else {
        let path = derived_unix_path.ok_or_else(|| {
            TransportError::UnknownSocketType(
                "core agent version < 1.3.0 but no derived Unix socket path was supplied".into(),
            )
        })?;
        Ok(SocketTarget::Unix(PathBuf::from(path)))
    }
}

fn parse_explicit(path: &str) -> Result<SocketTarget, TransportError> {
    if let Some(rest) = path.strip_prefix("tcp://") {
        let addr: SocketAddr = rest
            .parse()
            .map_err(|_| TransportError::UnknownSocketType(path.to_string()))?;
        Ok(SocketTarget::Tcp(addr))
    } else {
        Ok(SocketTarget::Unix(PathBuf::from(path)))
    }
}

/// Parse a `vMAJOR.MINOR.PATCH`-style version string into `(major, minor,
/// patch)`, defaulting missing components to 0.
fn parse_version(version: &str) -> (u32, u32, u32) {
    let stripped = version.strip_prefix('v').unwrap_or(version);
    let mut parts = stripped.split('.');
    let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (major, minor, patch)
}

fn version_at_least(version: &str, floor: (u32, u32, u32)) -> bool {
    parse_version(version) >= floor
}

/// Check whether the agent appears to be present at `target`, per spec
/// §4.D: Unix — file exists and is a socket; TCP — port reachable.
pub async fn probe_agent_exists(target: &SocketTarget) -> bool {
    match target {
        SocketTarget::Unix(path) => unix_socket_exists(path),
        SocketTarget::Tcp(addr) => {
            tokio::time::timeout(std::time::Duration::from_millis(200), tokio::net::TcpStream::connect(addr))
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false)
        }
    }
}

#[cfg(unix)]
fn unix_socket_exists(path: &std::path::Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::metadata(path)
        .map(|m| m.file_type().is_socket())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn unix_socket_exists(_path: &std::path::Path) -> bool {
    false
}
