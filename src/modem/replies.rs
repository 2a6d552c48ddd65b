//! Centralized AT reply fragment constants (§9: "substring matching on AT
//! replies... implementers should centralize the expected-fragment
//! constants").
//!
//! Per-vendor ECM fragments (`"usbnet",1`, `"3"`, `"4"`) and the APN literal
//! aren't here — they're a function of `(vendor, model)` / configuration, not
//! static text, and already live on [`super::Modem`] and [`crate::config`].

/// Generic modem-command success marker.
pub const OK: &str = "OK";

/// `check_sim_ready`'s full expected fragment.
pub const CPIN_READY: &str = "CPIN: READY";

/// `diagnose`'s narrower SIM-readiness fragment.
pub const SIM_READY: &str = "READY";

/// Home-network registration.
pub const REGISTERED_HOME: &str = "+CREG: 0,1";

/// Roaming registration.
pub const REGISTERED_ROAMING: &str = "+CREG: 0,5";

/// PDP context active on context id 0.
pub const PDP_ACTIVE_CID0: &str = "0,1";

/// PDP context active on context id 1.
pub const PDP_ACTIVE_CID1: &str = "1,1";
