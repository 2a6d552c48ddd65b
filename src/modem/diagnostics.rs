//! Diagnostic snapshot (§3 `DiagnosticProperties`, §4.3 `diagnose`).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A point-in-time snapshot of every health flag the supervisor checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticProperties {
    pub conn_interface: bool,
    pub usb_interface: bool,
    pub usb_driver: bool,
    pub modem_reachable: bool,
    pub pdp_context: bool,
    pub network_registered: bool,
    pub sim_ready: bool,
    pub modem_mode: bool,
    pub modem_apn: bool,
    pub modem_driver: bool,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticProperties {
    /// Every flag defaulted `true`, matching the modem's initial boot state
    /// before the first successful hardware profile pass.
    pub fn defaults() -> Self {
        Self {
            conn_interface: true,
            usb_interface: true,
            usb_driver: true,
            modem_reachable: true,
            pdp_context: true,
            network_registered: true,
            sim_ready: true,
            modem_mode: true,
            modem_apn: true,
            modem_driver: true,
            timestamp: Utc::now(),
        }
    }
}

/// Diagnosis mode: `0` writes a timestamped report, `1` overwrites the
/// repeated-failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisMode {
    Timestamped,
    Repeated,
}

/// Write a diagnostic report to the state directory.
///
/// `Timestamped` writes `cm-diag_<timestamp>.yaml`; `Repeated` overwrites
/// `cm-diag_repeated.yaml`.
pub fn write_report(state_dir: &Path, mode: DiagnosisMode, report: &DiagnosticProperties) {
    let file_name = match mode {
        DiagnosisMode::Timestamped => {
            format!("cm-diag_{}.yaml", report.timestamp.format("%Y%m%d%H%M%S"))
        },
        DiagnosisMode::Repeated => "cm-diag_repeated.yaml".to_string(),
    };

    let contents = match serde_yaml::to_string(report) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(%err, "failed to serialize diagnostic report");
            return;
        },
    };

    if let Err(err) = std::fs::write(state_dir.join(&file_name), contents) {
        warn!(%err, file = file_name, "failed to write diagnostic report");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_true() {
        let defaults = DiagnosticProperties::defaults();
        assert!(defaults.conn_interface);
        assert!(defaults.usb_interface);
        assert!(defaults.usb_driver);
        assert!(defaults.modem_reachable);
        assert!(defaults.pdp_context);
        assert!(defaults.network_registered);
        assert!(defaults.sim_ready);
        assert!(defaults.modem_mode);
        assert!(defaults.modem_apn);
        assert!(defaults.modem_driver);
    }
}
