//! Error taxonomy for the supervisor's external collaborators.
//!
//! Transport, modem and hardware errors are distinct [`thiserror`] enums so
//! callers can match on failure kind; they all flow up through
//! [`anyhow::Result`] at the action/supervisor boundary, same as the rest of
//! the pack's daemon-shaped crates.

use thiserror::Error;

/// Failures from the Transport Facade (§4.1).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("shell command `{command}` exited with status {status}")]
    NonZeroExit { command: String, status: i32 },

    #[error("failed to launch shell command `{command}`: {source}")]
    Launch { command: String, #[source] source: std::io::Error },

    #[error("D-Bus call failed: {0}")]
    Bus(#[from] zbus::Error),
}

/// Failures reported by Modem Controller operations (§4.3).
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("modem reply missing expected fragment {expected:?}: {reply:?}")]
    UnexpectedReply { expected: &'static str, reply: String },

    #[error("timed out waiting for: {0}")]
    Timeout(&'static str),

    #[error("modem could not be started")]
    StartupFailed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures from the Hardware Profiler (§4.2).
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("no known vendor matched in USB device list")]
    UnknownVendor,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
