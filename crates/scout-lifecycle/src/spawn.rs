// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spawn-argument construction and process launch for the core agent binary
//! (spec §4.E step 1, §6).

use std::path::Path;

use scout_config::LogLevel;
use scout_error::{ErrorCode, ScoutError};
use tokio::process::{Child, Command};

/// Build the argument vector the core agent binary expects:
/// `start --socket <path> --log-level <level>`.
#[must_use]
pub fn spawn_args(socket_path: &str, log_level: LogLevel) -> Vec<String> {
    vec![
        "start".to_string(),
        "--socket".to_string(),
        socket_path.to_string(),
        "--log-level".to_string(),
        log_level.to_string(),
    ]
}

/// Launch the core agent binary at `binary_path`, masking its permission bits
/// to `permissions` first (Unix only; a no-op elsewhere).
///
/// # Errors
///
/// Returns [`ErrorCode::InvalidConfiguration`] if the binary cannot be
/// chmod'd or spawned.
pub fn spawn_core_agent(
    binary_path: &Path,
    socket_path: &str,
    log_level: LogLevel,
    permissions: i64,
) -> Result<Child, ScoutError> {
    apply_permissions(binary_path, permissions)?;

    Command::new(binary_path)
        .args(spawn_args(socket_path, log_level))
        .kill_on_drop(false)
        .spawn()
        .map_err(|source| {
            ScoutError::new(
                ErrorCode::InvalidConfiguration,
                format!("failed to spawn core agent binary at {}", binary_path.display()),
            )
            .with_source(source)
        })
}

#[cfg(unix)]
fn apply_permissions(binary_path: &Path, permissions: i64) -> Result<(), ScoutError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = u32::try_from(permissions).unwrap_or(0o700);
    std::fs::set_permissions(binary_path, std::fs::Permissions::from_mode(mode)).map_err(
        |source| {
            ScoutError::new(
                ErrorCode::InvalidConfiguration,
                format!("failed to set permissions on {}", binary_path.display()),
            )
            .with_source(source)
        },
    )
}

#[cfg(not(unix))]
fn apply_permissions(_binary_path: &Path, _permissions: i64) -> Result<(), ScoutError> {
    Ok(())
}
