//! Per-vendor AT command set (§4.3, `update`).

/// The subset of [`super::Modem`] fields derived purely from `(vendor, model)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSet {
    pub interface_name: String,
    pub mode_status_cmd: String,
    pub reboot_cmd: String,
    pub pdp_activate_cmd: String,
    pub pdp_status_cmd: String,
    pub ecm_mode_setter_cmd: String,
    pub ecm_mode_expected: String,
}

/// Vendor/model identifier for Telit's ME910C1-WW, the one model whose ECM
/// setter/expected value differs from the rest of Telit's lineup.
const TELIT_ME910C1_WW: &str = "ME910C1-WW";

/// Rebuild the command set for a `(vendor, model)` pair. Total and idempotent
/// over the documented vendor set; an unrecognized vendor yields an all-empty
/// set (identification already hard-errors before this is called with one).
pub fn update_modem_commands(vendor: &str, model: &str) -> CommandSet {
    match vendor {
        "Quectel" => CommandSet {
            interface_name: "usb0".to_string(),
            mode_status_cmd: "AT+QCFG=\"usbnet\"".to_string(),
            reboot_cmd: "AT+CFUN=1,1".to_string(),
            pdp_activate_cmd: "AT".to_string(),
            pdp_status_cmd: "AT+CGACT?".to_string(),
            ecm_mode_setter_cmd: "AT+QCFG=\"usbnet\",1".to_string(),
            ecm_mode_expected: "\"usbnet\",1".to_string(),
        },
        "Telit" => {
            let (ecm_mode_setter_cmd, ecm_mode_expected) = if model == TELIT_ME910C1_WW {
                ("AT#USBCFG=3".to_string(), "3".to_string())
            } else {
                ("AT#USBCFG=4".to_string(), "4".to_string())
            };

            CommandSet {
                interface_name: "wwan0".to_string(),
                mode_status_cmd: "AT#USBCFG?".to_string(),
                reboot_cmd: "AT#REBOOT".to_string(),
                pdp_activate_cmd: "AT#ECM=1,0".to_string(),
                pdp_status_cmd: "AT#ECM?".to_string(),
                ecm_mode_setter_cmd,
                ecm_mode_expected,
            }
        },
        _ => CommandSet::default(),
    }
}
