//! Shell transport: uniform call/return for spawned processes.

use tokio::process::Command;
use tracing::debug;

use crate::error::TransportError;

/// Run a shell command, returning its captured stdout as text.
///
/// An error is returned when the process fails to launch or exits non-zero.
/// Callers match on substrings of the returned output; no structured parsing
/// happens here beyond the ping-latency helper in [`crate::modem::control`].
pub async fn run_shell(command: &str, args: &[&str]) -> Result<String, TransportError> {
    debug!(command, ?args, "running shell command");

    let output = Command::new(command)
        .args(args)
        .output()
        .await
        .map_err(|source| TransportError::Launch { command: command.to_string(), source })?;

    if !output.status.success() {
        return Err(TransportError::NonZeroExit {
            command: command.to_string(),
            status: output.status.code().unwrap_or(-1),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
