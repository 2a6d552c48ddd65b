//! Transport Facade (§4.1): uniform call/return for shell commands and
//! AT-over-D-Bus.
//!
//! Exposed as a trait, not free functions, so every caller takes `&dyn
//! Transport` and the real OS-backed implementation can be swapped for an
//! in-memory fake in tests (§8's end-to-end scenarios).

mod dbus;
mod shell;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::error::TransportError;

/// Uniform call/return for the two external transports the core depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a process, capturing stdout. An error is returned when the
    /// process fails to launch or exits non-zero.
    async fn run_shell(&self, command: &str, args: &[&str]) -> Result<String, TransportError>;

    /// Send an AT command to ModemManager over the system bus and return its
    /// reply. A bus/transport failure is an error; a modem error reply (no
    /// `OK` fragment) is not — callers inspect the reply text themselves.
    async fn run_at(&self, at_command: &str) -> Result<String, TransportError>;
}

/// The real, OS-backed transport: spawns processes and talks to
/// ModemManager over D-Bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTransport;

#[async_trait]
impl Transport for SystemTransport {
    async fn run_shell(&self, command: &str, args: &[&str]) -> Result<String, TransportError> {
        shell::run_shell(command, args).await
    }

    async fn run_at(&self, at_command: &str) -> Result<String, TransportError> {
        dbus::run_at(at_command).await
    }
}
