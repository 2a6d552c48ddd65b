//! Modem Controller operations (§4.3): configuration, health probes, and
//! tiered recovery. Each operation reports success/failure without touching
//! conductor state — the supervisor propagates the outcome.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

use super::diagnostics::{self, DiagnosisMode, DiagnosticProperties};
use super::{gpio, replies};
use super::Modem;
use crate::config::Configuration;
use crate::error::ModemError;
use crate::sbc::SbcProfile;
use crate::transport::Transport;

/// Diagnosis pass variant, as distinguished by which step entered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnoseType {
    Initial,
    Repeated,
}

impl Modem {
    /// Ensure APN and ECM mode match configuration, falling through to a
    /// soft reset if the modem doesn't come back up afterward.
    pub async fn configure_modem(
        &mut self,
        config: &Configuration,
        transport: &dyn Transport,
    ) -> Result<(), ModemError> {
        let apn_literal = format!("\"{}\"", config.apn);

        let apn_reply = transport.run_at("AT+CGDCONT?").await?;
        if !apn_reply.contains(&apn_literal) {
            info!(apn = config.apn, "APN mismatch, reconfiguring");
            transport.run_at(&format!("AT+CGDCONT=1,\"IPV4V6\",\"{}\"", config.apn)).await?;
        }

        let mode_reply = transport.run_at(&self.mode_status_cmd).await?;
        if !mode_reply.contains(&self.ecm_mode_expected) {
            transport.run_at(&self.ecm_mode_setter_cmd).await?;
            sleep(Duration::from_secs(20)).await;
        }

        if self.wait_modem_started(transport).await.is_err() {
            warn!("modem did not come back up after configuration, soft-resetting");
            self.soft_modem_reset(transport).await?;
        }

        Ok(())
    }

    /// `AT+CPIN?` reply must contain `CPIN: READY`.
    pub async fn check_sim_ready(&self, transport: &dyn Transport) -> Result<(), ModemError> {
        let reply = transport.run_at("AT+CPIN?").await?;
        require_fragment(&reply, replies::CPIN_READY)
    }

    /// `AT+CREG?` reply must contain `OK` and either home or roaming
    /// registration.
    pub async fn check_network(&self, transport: &dyn Transport) -> Result<(), ModemError> {
        let reply = transport.run_at("AT+CREG?").await?;
        require_fragment(&reply, replies::OK)?;

        if reply.contains(replies::REGISTERED_HOME) || reply.contains(replies::REGISTERED_ROAMING) {
            Ok(())
        } else {
            Err(ModemError::UnexpectedReply { expected: "+CREG: 0,1 or +CREG: 0,5", reply })
        }
    }

    /// Activate the PDP context / ECM bearer if it isn't already up.
    pub async fn initiate_ecm(&self, transport: &dyn Transport) -> Result<(), ModemError> {
        let reply = transport.run_at(&self.pdp_status_cmd).await?;
        require_fragment(&reply, replies::OK)?;

        if reply.contains(replies::PDP_ACTIVE_CID0) || reply.contains(replies::PDP_ACTIVE_CID1) {
            sleep(Duration::from_millis(10_000)).await;
            return Ok(());
        }

        transport.run_at(&self.pdp_activate_cmd).await?;

        poll_until(Duration::from_secs(60), Duration::from_secs(1), || async {
            let reply = transport.run_at(&self.pdp_status_cmd).await.ok()?;
            (reply.contains(replies::PDP_ACTIVE_CID0) || reply.contains(replies::PDP_ACTIVE_CID1)).then_some(())
        })
        .await
        .ok_or(ModemError::Timeout("PDP context activation"))
    }

    /// Ping over the modem's interface and record latency/connectivity.
    pub async fn check_internet(
        &mut self,
        config: &Configuration,
        transport: &dyn Transport,
    ) -> Result<(), ModemError> {
        let timeout = config.ping_timeout.to_string();
        let result = transport
            .run_shell("ping", &["-1", "-c", "1", "-s", "8", "-w", &timeout, "-I", &self.interface_name, "8.8.8.8"])
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                self.monitoring.cellular_connection = false;
                self.monitoring.cellular_latency_ms = 0;
                return Err(ModemError::Transport(err));
            },
        };

        self.monitoring.cellular_latency_ms = parse_min_latency_ms(&output).unwrap_or(0);
        self.monitoring.cellular_connection = true;

        if self.incident_flag {
            self.monitoring.fixed_incidents += 1;
            self.incident_flag = false;
        }

        Ok(())
    }

    /// Refresh every diagnostic flag and write a report.
    pub async fn diagnose(
        &mut self,
        config: &Configuration,
        state_dir: &Path,
        transport: &dyn Transport,
        kind: DiagnoseType,
    ) -> Result<(), ModemError> {
        let routes = transport.run_shell("route", &["-n"]).await.unwrap_or_default();
        let usb_devices = transport.run_shell("lsusb", &[]).await.unwrap_or_default();
        let usb_devices_verbose = transport.run_shell("usb-devices", &[]).await.unwrap_or_default();
        let at_reply = transport.run_at("AT").await.unwrap_or_default();
        let pdp_reply = transport.run_at(&self.pdp_status_cmd).await.unwrap_or_default();
        let network_ok = self.check_network(transport).await.is_ok();
        let apn_reply = transport.run_at("AT+CGDCONT?").await.unwrap_or_default();
        let mode_reply = transport.run_at(&self.mode_status_cmd).await.unwrap_or_default();
        let sim_reply = transport.run_at("AT+CPIN?").await.unwrap_or_default();

        let report = DiagnosticProperties {
            conn_interface: routes.contains(&self.interface_name),
            usb_interface: usb_devices.contains(&self.vendor),
            usb_driver: usb_devices_verbose.matches("cdc_ether").count() >= 2,
            modem_reachable: at_reply.contains(replies::OK),
            pdp_context: pdp_reply.contains(replies::PDP_ACTIVE_CID1),
            network_registered: network_ok,
            modem_apn: apn_reply.contains(&format!("\"{}\"", config.apn)),
            modem_mode: mode_reply.contains(&self.ecm_mode_expected),
            sim_ready: sim_reply.contains(replies::SIM_READY),
            modem_driver: usb_devices_verbose.matches("cdc_ether").count() >= 2,
            timestamp: Utc::now(),
        };

        self.diagnostics = report.clone();

        let mode = match kind {
            DiagnoseType::Initial => DiagnosisMode::Timestamped,
            DiagnoseType::Repeated => DiagnosisMode::Repeated,
        };
        diagnostics::write_report(state_dir, mode, &report);

        Ok(())
    }

    /// Bounce the network interface down and back up.
    pub async fn reset_connection_interface(&self, transport: &dyn Transport) -> Result<(), ModemError> {
        transport.run_shell("ip", &["link", "set", "dev", &self.interface_name, "down"]).await?;
        sleep(Duration::from_secs(5)).await;
        transport.run_shell("ip", &["link", "set", "dev", &self.interface_name, "up"]).await?;

        poll_until(Duration::from_secs(20), Duration::from_secs(1), || async {
            let routes = transport.run_shell("route", &["-n"]).await.ok()?;
            routes.contains(&self.interface_name).then_some(())
        })
        .await
        .ok_or(ModemError::Timeout("connection interface reset"))
    }

    /// Open the USB device by VID/PID and issue a bus-level reset.
    pub async fn reset_usb_interface(&self) -> Result<(), ModemError> {
        let vendor_id = u16::from_str_radix(&self.vendor_id, 16)
            .map_err(|_| ModemError::UnexpectedReply { expected: "hex VID", reply: self.vendor_id.clone() })?;
        let product_id = u16::from_str_radix(&self.product_id, 16)
            .map_err(|_| ModemError::UnexpectedReply { expected: "hex PID", reply: self.product_id.clone() })?;

        let device_info = nusb::list_devices()
            .map_err(|_| ModemError::Timeout("USB enumeration"))?
            .find(|device| device.vendor_id() == vendor_id && device.product_id() == product_id)
            .ok_or(ModemError::Timeout("USB device not found"))?;

        let device = device_info.open().map_err(|_| ModemError::Timeout("USB device open"))?;
        device.reset().map_err(|_| ModemError::Timeout("USB bus reset"))?;

        Ok(())
    }

    /// Write the reboot command, wait for the modem to disappear, then wait
    /// for it to come back.
    pub async fn soft_modem_reset(&mut self, transport: &dyn Transport) -> Result<(), ModemError> {
        let reply = transport.run_at(&self.reboot_cmd).await?;
        require_fragment(&reply, replies::OK)?;

        let vendor = self.vendor.clone();
        let turned_off = poll_until(Duration::from_secs(20), Duration::from_secs(1), || async {
            let usb_devices = transport.run_shell("lsusb", &[]).await.ok()?;
            (!usb_devices.contains(&vendor)).then_some(())
        })
        .await;

        if turned_off.is_none() {
            warn!("modem did not turn off within the expected window");
        }

        self.wait_modem_started(transport).await
    }

    /// Drive the SBC's modem-power GPIO low, then high. No verification.
    pub async fn hard_modem_reset(&self, sbc: &SbcProfile) -> Result<(), ModemError> {
        gpio::hard_reset(sbc.modem_disable_gpio_pin).await;
        Ok(())
    }

    /// Three sequential waits, each must succeed before the next: the modem
    /// reappearing on USB, answering AT, then its interface routing.
    pub async fn wait_modem_started(&self, transport: &dyn Transport) -> Result<(), ModemError> {
        let vendor = self.vendor.clone();
        poll_until(Duration::from_secs(120), Duration::from_secs(1), || async {
            let usb_devices = transport.run_shell("lsusb", &[]).await.ok()?;
            usb_devices.contains(&vendor).then_some(())
        })
        .await
        .ok_or(ModemError::StartupFailed)?;

        poll_until(Duration::from_secs(10), Duration::from_secs(1), || async {
            let reply = transport.run_at("AT").await.ok()?;
            reply.contains(replies::OK).then_some(())
        })
        .await
        .ok_or(ModemError::StartupFailed)?;

        let interface_name = self.interface_name.clone();
        poll_until(Duration::from_secs(20), Duration::from_secs(1), || async {
            let routes = transport.run_shell("route", &["-n"]).await.ok()?;
            routes.contains(&interface_name).then_some(())
        })
        .await
        .ok_or(ModemError::StartupFailed)
    }
}

/// Require `reply` to contain `fragment`, otherwise a device-reply error.
fn require_fragment(reply: &str, fragment: &'static str) -> Result<(), ModemError> {
    if reply.contains(fragment) {
        Ok(())
    } else {
        Err(ModemError::UnexpectedReply { expected: fragment, reply: reply.to_string() })
    }
}

/// Poll `probe` once per `step` until it succeeds or `budget` elapses.
async fn poll_until<F, Fut>(budget: Duration, step: Duration, mut probe: F) -> Option<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<()>>,
{
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        if let Some(()) = probe().await {
            return Some(());
        }

        if tokio::time::Instant::now() >= deadline {
            return None;
        }

        sleep(step).await;
    }
}

/// Parse the `min` field out of a `ping` summary line
/// (`min/avg/max/mdev = a/b/c/d ms`), truncated to integer milliseconds.
fn parse_min_latency_ms(ping_output: &str) -> Option<u32> {
    let summary_line = ping_output.lines().find(|line| line.contains("min/avg/max"))?;
    let values = summary_line.split('=').nth(1)?;
    let min_field = values.trim().split('/').next()?;
    min_field.trim().parse::<f64>().ok().map(|value| value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;

    #[test]
    fn parses_min_latency_from_ping_summary() {
        let output = "round-trip min/avg/max/mdev = 23.456/23.456/23.456/0.000 ms\n";
        assert_eq!(parse_min_latency_ms(output), Some(23));
    }

    #[test]
    fn missing_summary_line_yields_none() {
        assert_eq!(parse_min_latency_ms("no such line here\n"), None);
    }

    #[tokio::test]
    async fn require_fragment_passes_when_present() {
        assert!(require_fragment("+CPIN: READY\nOK\n", "CPIN: READY").is_ok());
    }

    #[tokio::test]
    async fn require_fragment_fails_when_absent() {
        let result = require_fragment("+CPIN: SIM PIN\nOK\n", "CPIN: READY");
        assert!(matches!(result, Err(ModemError::UnexpectedReply { .. })));
    }

    #[tokio::test]
    async fn check_sim_ready_uses_fake_transport() {
        let transport = FakeTransport::new();
        transport.queue_at_ok("AT+CPIN?", "+CPIN: READY\nOK\n");

        let modem = Modem::new();
        assert!(modem.check_sim_ready(&transport).await.is_ok());
    }
}
