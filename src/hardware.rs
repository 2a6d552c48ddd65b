//! Hardware Profiler (§4.2).
//!
//! Builds a [`HardwareProfile`] by probing the USB bus and the modem over
//! AT-over-D-Bus, then compares it against the previously persisted
//! `system.yaml` snapshot to detect a changed setup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::HardwareError;
use crate::transport::Transport;

/// Name of the persisted hardware profile file.
const PROFILE_FILE: &str = "system.yaml";

/// A supported cellular modem vendor and its USB VID / module-PID table.
struct VendorModem {
    name: &'static str,
    vid: &'static str,
    modules: &'static [(&'static str, &'static str)],
}

/// Static vendor table (§4.2).
const VENDORS: &[VendorModem] = &[
    VendorModem {
        name: "Quectel",
        vid: "2c7c",
        modules: &[("EX25-Series", "0125"), ("EC21", "0121")],
    },
    VendorModem {
        name: "Telit",
        vid: "1bc7",
        modules: &[
            ("LE910CX-Series_COMP_1", "1201"),
            ("LE910CX-Series_COMP_2", "1206"),
            ("ME910C1-WW_COMP_1", "1101"),
            ("ME910C1-WW_COMP_2", "1102"),
        ],
    },
];

/// Inventory snapshot: modem identity + OS/board metadata (§3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub modem_vendor: String,
    pub modem_name: String,
    pub modem_vendor_id: String,
    pub modem_product_id: String,
    pub imei: String,
    pub software_version: String,
    pub iccid: String,
    pub architecture: String,
    pub kernel: String,
    pub hostname: String,
    pub platform: String,
    pub board: String,
}

/// Build a fresh hardware profile, compare it against the persisted snapshot,
/// and persist it if it changed.
pub async fn get_hardware_profile(
    state_dir: &Path,
    transport: &dyn Transport,
) -> Result<HardwareProfile, HardwareError> {
    let old_profile = load_hardware_profile(state_dir);

    info!("begin system network hardware profile construction");

    let mut profile = HardwareProfile::default();

    identify_vendor_name(&mut profile, transport).await?;
    turn_off_echo(transport).await?;
    identify_product_name(&mut profile, transport).await?;
    identify_usb_ids(&mut profile, transport).await?;
    identify_imei(&mut profile, transport).await;
    identify_firmware_version(&mut profile, transport).await;
    identify_iccid(&mut profile, transport).await;
    identify_os(&mut profile, transport).await;
    identify_board(&mut profile, transport).await?;

    info!(?profile, "hardware profile report");

    if Some(&profile) != old_profile.as_ref() {
        info!("system setup has changed");
        if let Err(err) = save_hardware_profile(state_dir, &profile) {
            warn!(%err, "failed to persist hardware profile");
        }
    }

    Ok(profile)
}

fn load_hardware_profile(state_dir: &Path) -> Option<HardwareProfile> {
    let contents = std::fs::read_to_string(state_dir.join(PROFILE_FILE)).ok()?;
    serde_yaml::from_str(&contents).ok()
}

fn save_hardware_profile(state_dir: &Path, profile: &HardwareProfile) -> std::io::Result<()> {
    let contents = serde_yaml::to_string(profile).expect("HardwareProfile always serializes");
    let final_path = state_dir.join(PROFILE_FILE);
    let tmp_path = state_dir.join(format!("{PROFILE_FILE}.tmp"));
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(tmp_path, final_path)
}

async fn identify_vendor_name(profile: &mut HardwareProfile, transport: &dyn Transport) -> Result<(), HardwareError> {
    let usb_devices = transport.run_shell("lsusb", &[]).await?;

    for vendor in VENDORS {
        if usb_devices.contains(vendor.vid) {
            profile.modem_vendor = vendor.name.to_string();
        }
    }

    if profile.modem_vendor.is_empty() {
        return Err(HardwareError::UnknownVendor);
    }

    Ok(())
}

async fn turn_off_echo(transport: &dyn Transport) -> Result<(), HardwareError> {
    transport.run_at("ATE0").await?;
    Ok(())
}

async fn identify_product_name(profile: &mut HardwareProfile, transport: &dyn Transport) -> Result<(), HardwareError> {
    let usb_devices = transport.run_shell("lsusb", &[]).await?;
    let gmm_reply = transport.run_at("AT+GMM").await.unwrap_or_default();
    let haystack = format!("{usb_devices}{gmm_reply}");

    for vendor in VENDORS {
        for (module_name, pid) in vendor.modules {
            if haystack.contains(pid) {
                profile.modem_name = module_name.split('_').next().unwrap_or(module_name).to_string();
            }
        }
    }

    if profile.modem_name.is_empty() {
        warn!("modem name could not be found");
    }

    Ok(())
}

async fn identify_usb_ids(profile: &mut HardwareProfile, transport: &dyn Transport) -> Result<(), HardwareError> {
    let usb_devices = transport.run_shell("lsusb", &[]).await?;

    for vendor in VENDORS {
        if usb_devices.contains(vendor.vid) {
            profile.modem_vendor_id = vendor.vid.to_string();
        }
        for (module_name, pid) in vendor.modules {
            if usb_devices.contains(module_name) {
                profile.modem_product_id = pid.to_string();
            }
        }
    }

    if profile.modem_vendor_id.is_empty() {
        warn!("modem vendor id could not be found");
    }
    if profile.modem_product_id.is_empty() {
        warn!("modem product id could not be found");
    }

    Ok(())
}

async fn identify_imei(profile: &mut HardwareProfile, transport: &dyn Transport) {
    match transport.run_at("AT+CGSN").await {
        Ok(reply) => profile.imei = reply.trim().to_string(),
        Err(err) => warn!(%err, "unable to get IMEI from modem"),
    }
}

async fn identify_firmware_version(profile: &mut HardwareProfile, transport: &dyn Transport) {
    match transport.run_at("AT+CGMR").await {
        Ok(reply) => profile.software_version = reply.trim().to_string(),
        Err(err) => warn!(%err, "unable to get firmware version from modem"),
    }
}

async fn identify_iccid(profile: &mut HardwareProfile, transport: &dyn Transport) {
    match transport.run_at("AT+ICCID").await {
        Ok(reply) => profile.iccid = reply.trim().to_string(),
        Err(err) => warn!(%err, "unable to get ICCID from modem"),
    }
}

async fn identify_os(profile: &mut HardwareProfile, transport: &dyn Transport) {
    profile.architecture = std::env::consts::ARCH.to_string();

    // `uname` always prints sysname, release, nodename in that fixed order
    // regardless of the flag order requested; kernel/platform/hostname all
    // come from this one shell-out.
    match transport.run_shell("uname", &["-srn"]).await {
        Ok(reply) => {
            let mut parts = reply.split_whitespace();
            profile.kernel = parts.next().unwrap_or_default().to_string();
            profile.platform = parts.next().unwrap_or_default().to_string();
            profile.hostname = parts.next().unwrap_or_default().to_string();
        },
        Err(err) => warn!(%err, "unable to get OS metadata"),
    }
}

async fn identify_board(profile: &mut HardwareProfile, transport: &dyn Transport) -> Result<(), HardwareError> {
    let board = transport.run_shell("cat", &["/sys/firmware/devicetree/base/model"]).await?;
    profile.board = board.trim_end_matches('\0').trim().to_string();

    if profile.board.is_empty() {
        warn!("board model could not be found");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_is_text_before_first_underscore() {
        let (module_name, _) = VENDORS[1].modules[2];
        assert_eq!(module_name.split('_').next().unwrap(), "ME910C1-WW");
    }

    #[test]
    fn vendor_table_has_no_duplicate_vids() {
        let vids: Vec<_> = VENDORS.iter().map(|vendor| vendor.vid).collect();
        let mut unique = vids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(vids.len(), unique.len());
    }

    #[test]
    fn profile_round_trips_through_yaml() {
        let profile = HardwareProfile {
            modem_vendor: "Quectel".to_string(),
            modem_name: "EC21".to_string(),
            modem_vendor_id: "2c7c".to_string(),
            modem_product_id: "0121".to_string(),
            imei: "123456789012345".to_string(),
            software_version: "EC21EFAR06A01M4G".to_string(),
            iccid: "89014103211118510720".to_string(),
            architecture: "aarch64".to_string(),
            kernel: "Linux".to_string(),
            hostname: "edge-01".to_string(),
            platform: "6.1.0".to_string(),
            board: "Raspberry Pi 4 Model B".to_string(),
        };

        let serialized = serde_yaml::to_string(&profile).unwrap();
        let roundtripped: HardwareProfile = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(profile, roundtripped);

        let reserialized = serde_yaml::to_string(&roundtripped).unwrap();
        assert_eq!(serialized, reserialized);
    }

    #[tokio::test]
    async fn identifies_quectel_over_a_fake_transport() {
        let transport = crate::transport::fake::FakeTransport::new();
        transport.queue_shell_ok("lsusb", "Bus 001 Device 002: ID 2c7c:0121 Quectel EC21");
        transport.queue_at_ok("AT+GMM", "EC21\nOK\n");
        transport.queue_at_ok("AT+CGSN", "123456789012345\nOK\n");
        transport.queue_at_ok("AT+CGMR", "EC21EFAR06A01M4G\nOK\n");
        transport.queue_at_ok("AT+ICCID", "89014103211118510720\nOK\n");
        transport.queue_shell_ok("uname", "Linux 6.1.0 edge-01\n");
        transport.queue_shell_ok("cat", "Raspberry Pi 4 Model B\0\n");

        let state_dir = std::env::temp_dir().join("modemd-hardware-test-quectel");
        std::fs::create_dir_all(&state_dir).unwrap();

        let profile = get_hardware_profile(&state_dir, &transport).await.unwrap();

        assert_eq!(profile.modem_vendor, "Quectel");
        assert_eq!(profile.modem_name, "EC21");
        assert_eq!(profile.modem_vendor_id, "2c7c");
        assert_eq!(profile.imei, "123456789012345");

        std::fs::remove_dir_all(&state_dir).unwrap();
    }

    #[tokio::test]
    async fn unknown_vendor_is_a_hard_error() {
        let transport = crate::transport::fake::FakeTransport::new();
        transport.queue_shell_ok("lsusb", "Bus 001 Device 002: ID ffff:ffff Unknown Inc.");

        let state_dir = std::env::temp_dir().join("modemd-hardware-test-unknown");
        std::fs::create_dir_all(&state_dir).unwrap();

        let result = get_hardware_profile(&state_dir, &transport).await;
        assert!(matches!(result, Err(HardwareError::UnknownVendor)));

        std::fs::remove_dir_all(&state_dir).unwrap();
    }
}
