//! AT-over-D-Bus transport, via ModemManager.
//!
//! Narrower than the teacher's [`crate`]-adjacent `dbus::modem_manager`
//! property surface: this daemon only needs the `Command` method of the
//! `Modem` interface, with substring matching done entirely by callers.

use tracing::debug;
use zbus::{Connection, proxy};

use crate::error::TransportError;

/// Timeout argument, in seconds, passed with every AT command.
const AT_COMMAND_TIMEOUT_SECS: u32 = 30;

#[proxy(
    interface = "org.freedesktop.ModemManager1.Modem",
    default_service = "org.freedesktop.ModemManager1",
    default_path = "/org/freedesktop/ModemManager1/Modem/0"
)]
trait Modem {
    /// Command method.
    fn command(&self, cmd: &str, timeout: u32) -> zbus::Result<String>;
}

/// Send an AT command to the modem over the system bus and return its reply.
///
/// A bus/transport failure is an error. A modem error reply (no `OK`
/// fragment) is *not* an error at this layer — callers inspect the reply
/// text themselves.
pub async fn run_at(at_command: &str) -> Result<String, TransportError> {
    debug!(at_command, "sending AT command over D-Bus");

    let connection = Connection::system().await?;
    let modem = ModemProxy::new(&connection).await?;
    let reply = modem.command(at_command, AT_COMMAND_TIMEOUT_SECS).await?;

    Ok(reply)
}
