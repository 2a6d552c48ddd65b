//! Sysfs GPIO power control for hard modem resets (§4.3.1).
//!
//! No GPIO crate is carried — the pack has none, and the teacher's
//! `module/battery.rs` already shows the idiom of reading/writing sysfs files
//! directly with `std::fs` rather than shelling out.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

const GPIO_ROOT: &str = "/sys/class/gpio";

fn pin_dir(pin: u32) -> PathBuf {
    PathBuf::from(GPIO_ROOT).join(format!("gpio{pin}"))
}

/// Ensure `pin` is exported and configured as an output.
async fn init_pin(pin: u32) {
    if !pin_dir(pin).exists() {
        if let Err(err) = std::fs::write(format!("{GPIO_ROOT}/export"), pin.to_string()) {
            warn!(pin, %err, "error exporting GPIO pin");
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    if let Err(err) = std::fs::write(pin_dir(pin).join("direction"), "out") {
        warn!(pin, %err, "error initializing GPIO pin");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
}

/// Unexport `pin`, relinquishing the sysfs GPIO handle. Only called from a
/// real teardown path (process shutdown), never between a single enable or
/// disable — the pin stays exported and driven across the process lifetime
/// so repeated resets don't pay the export/settle cost each time.
pub fn teardown(pin: u32) {
    if let Err(err) = std::fs::write(format!("{GPIO_ROOT}/unexport"), pin.to_string()) {
        warn!(pin, %err, "error unexporting GPIO pin");
    }
}

/// Enable modem power (drive the disable pin low).
pub async fn modem_power_enable(pin: u32) {
    init_pin(pin).await;

    if let Err(err) = std::fs::write(pin_dir(pin).join("value"), "0") {
        warn!(pin, %err, "error enabling modem power");
    }
}

/// Disable modem power (drive the disable pin high).
pub async fn modem_power_disable(pin: u32) {
    init_pin(pin).await;

    if let Err(err) = std::fs::write(pin_dir(pin).join("value"), "1") {
        warn!(pin, %err, "error disabling modem power");
    }
}

/// Hard-cycle modem power: disable for 2 s, then re-enable. No verification —
/// the supervisor's next step observes the outcome.
pub async fn hard_reset(pin: u32) {
    modem_power_disable(pin).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    modem_power_enable(pin).await;
}
