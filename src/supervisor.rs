//! Connection Supervisor (§4.5): the action table and the tick loop that
//! walks it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::conductor::Conductor;
use crate::config::Configuration;
use crate::hardware::get_hardware_profile;
use crate::modem::control::DiagnoseType;
use crate::modem::Modem;
use crate::sbc::SbcProfile;
use crate::transport::Transport;

/// Which operation a step dispatches to. The variant names mirror the
/// action table's `action` column, not a generic "step N" label, so a
/// duplicated `CheckInternet`/`Diagnose` destination is still distinguishable
/// by which recovery rung it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Organizer,
    IdentifySetup,
    ConfigureModem,
    CheckNetwork,
    InitiateEcm,
    CheckInternet,
    DiagnoseInitial,
    ResetConnectionInterface,
    CheckInternetAfterInterfaceReset,
    ResetUsbInterface,
    CheckInternetAfterUsbReset,
    ResetModemSoftly,
    ResetModemHardly,
    DiagnoseAfterConfigureFailure,
    CheckSimReady,
    DiagnoseAfterHardResetFailure,
}

/// One row of the action table: the `set_step` arguments a step applies to
/// itself before doing its work, keyed by step index.
#[derive(Debug, Clone, Copy)]
struct StepSpec {
    action: Action,
    base: usize,
    success: usize,
    fail: usize,
    interval: f32,
    retry: u32,
}

/// The literal §4.5 recovery graph. Index 0 is the organizer, handled
/// directly by [`Conductor::organizer`] rather than dispatched through here.
const TABLE: [StepSpec; 16] = [
    StepSpec { action: Action::Organizer, base: 0, success: 0, fail: 0, interval: 0.0, retry: 0 },
    StepSpec { action: Action::IdentifySetup, base: 1, success: 2, fail: 15, interval: 2.0, retry: 20 },
    StepSpec { action: Action::ConfigureModem, base: 2, success: 14, fail: 13, interval: 1.0, retry: 5 },
    StepSpec { action: Action::CheckNetwork, base: 3, success: 4, fail: 13, interval: 5.0, retry: 120 },
    StepSpec { action: Action::InitiateEcm, base: 4, success: 5, fail: 13, interval: 0.1, retry: 5 },
    StepSpec { action: Action::CheckInternet, base: 5, success: 5, fail: 6, interval: 0.0, retry: 1 },
    StepSpec { action: Action::DiagnoseInitial, base: 6, success: 7, fail: 7, interval: 0.1, retry: 5 },
    StepSpec { action: Action::ResetConnectionInterface, base: 7, success: 8, fail: 9, interval: 1.0, retry: 2 },
    StepSpec {
        action: Action::CheckInternetAfterInterfaceReset,
        base: 8,
        success: 5,
        fail: 9,
        interval: 10.0,
        retry: 0,
    },
    StepSpec { action: Action::ResetUsbInterface, base: 9, success: 10, fail: 11, interval: 1.0, retry: 2 },
    StepSpec {
        action: Action::CheckInternetAfterUsbReset,
        base: 10,
        success: 5,
        fail: 11,
        interval: 10.0,
        retry: 0,
    },
    StepSpec { action: Action::ResetModemSoftly, base: 11, success: 1, fail: 12, interval: 1.0, retry: 1 },
    StepSpec { action: Action::ResetModemHardly, base: 12, success: 1, fail: 1, interval: 1.0, retry: 1 },
    StepSpec {
        action: Action::DiagnoseAfterConfigureFailure,
        base: 13,
        success: 7,
        fail: 7,
        interval: 0.1,
        retry: 5,
    },
    StepSpec { action: Action::CheckSimReady, base: 14, success: 3, fail: 13, interval: 1.0, retry: 5 },
    StepSpec {
        action: Action::DiagnoseAfterHardResetFailure,
        base: 15,
        success: 12,
        fail: 12,
        interval: 0.1,
        retry: 5,
    },
];

/// Step indices that open an incident window: the Supervisor treats internet
/// connectivity as down the moment it enters one of these, and closes the
/// window only when a subsequent `check_internet` at any of them succeeds.
fn marks_incident(step: usize) -> bool {
    matches!(step, 5 | 8 | 10)
}

/// Everything one supervisor tick needs, held behind a single mutex so only
/// one step runs at a time (§5).
pub struct SupervisorContext {
    pub modem: Modem,
    pub conductor: Conductor,
    pub config: Configuration,
    pub sbc: SbcProfile,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub transport: Arc<dyn Transport>,
}

impl SupervisorContext {
    pub fn new(
        config: Configuration,
        sbc: SbcProfile,
        config_dir: PathBuf,
        state_dir: PathBuf,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self { modem: Modem::new(), conductor: Conductor::new(), config, sbc, config_dir, state_dir, transport }
    }
}

/// Run the supervisor loop until `shutdown` resolves. Each iteration acquires
/// `context`, runs exactly one step, releases it, then sleeps for the
/// interval the step declared — the mutex is not held across the sleep, so a
/// shutdown signal observed between ticks takes effect promptly.
pub async fn manage_connections(
    context: Arc<Mutex<SupervisorContext>>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    loop {
        reload_config(&context).await;

        let interval = manage_connection(&context).await;

        tokio::select! {
            _ = sleep(Duration::from_secs_f32(interval.max(0.0))) => {},
            _ = &mut shutdown => {
                info!("shutdown signal observed, stopping supervisor loop");
                return;
            },
        }
    }
}

/// Re-run the configuration loader so a `config_request*.yaml` dropped
/// between ticks takes effect before the next step runs (§4.6). A no-op when
/// nothing new is pending, since the loader is idempotent over an unchanged
/// `config.yaml` with no request files.
async fn reload_config(context: &Mutex<SupervisorContext>) {
    let mut guard = context.lock().await;
    let config_dir = guard.config_dir.clone();
    let mut reloaded = Configuration::load(&config_dir);
    reloaded.mark_changes_since(&guard.config);
    guard.config = reloaded;
}

/// Run exactly one organizer pass plus one dispatched action, returning the
/// interval the caller should sleep for.
async fn manage_connection(context: &Mutex<SupervisorContext>) -> f32 {
    let mut guard = context.lock().await;

    guard.conductor.organizer();
    let current = guard.conductor.current();
    let spec = TABLE[current];

    if marks_incident(current) {
        guard.modem.incident_flag = true;
        guard.modem.monitoring.cellular_connection = false;
    }

    let interval = if spec.action == Action::CheckInternet {
        guard.config.check_internet_interval as f32
    } else {
        spec.interval
    };

    guard.conductor.set_step(current, spec.base, spec.success, spec.fail, interval, false, spec.retry);

    let ok = execute(&mut guard, spec.action).await;
    guard.conductor.set_ok(ok);

    info!(step = current, ok, "supervisor step complete");

    interval
}

/// Dispatch to the operation a step names and report whether it succeeded.
async fn execute(context: &mut SupervisorContext, action: Action) -> bool {
    let SupervisorContext { modem, config, sbc, state_dir, transport, .. } = context;
    let transport = transport.as_ref();

    match action {
        Action::Organizer => true,
        Action::IdentifySetup => match get_hardware_profile(state_dir, transport).await {
            Ok(profile) => {
                modem.update(&profile);
                true
            },
            Err(err) => {
                warn!(%err, "hardware profile identification failed");
                false
            },
        },
        Action::ConfigureModem => report(modem.configure_modem(config, transport).await),
        Action::CheckNetwork => report(modem.check_network(transport).await),
        Action::InitiateEcm => report(modem.initiate_ecm(transport).await),
        Action::CheckInternet | Action::CheckInternetAfterInterfaceReset | Action::CheckInternetAfterUsbReset => {
            report(modem.check_internet(config, transport).await)
        },
        Action::DiagnoseInitial => {
            let _ = modem.diagnose(config, state_dir, transport, DiagnoseType::Initial).await;
            true
        },
        Action::DiagnoseAfterConfigureFailure | Action::DiagnoseAfterHardResetFailure => {
            let _ = modem.diagnose(config, state_dir, transport, DiagnoseType::Repeated).await;
            true
        },
        Action::ResetConnectionInterface => report(modem.reset_connection_interface(transport).await),
        Action::ResetUsbInterface => report(modem.reset_usb_interface().await),
        Action::ResetModemSoftly => report(modem.soft_modem_reset(transport).await),
        Action::ResetModemHardly => report(modem.hard_modem_reset(sbc).await),
        Action::CheckSimReady => report(modem.check_sim_ready(transport).await),
    }
}

fn report<T, E: std::fmt::Display>(result: Result<T, E>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => {
            warn!(%err, "step action failed");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_index_matches_its_own_base() {
        for (index, spec) in TABLE.iter().enumerate().skip(1) {
            assert_eq!(spec.base, index, "row {index} must set_step its own index as base");
        }
    }

    #[test]
    fn every_destination_is_a_valid_table_index() {
        for spec in TABLE.iter().skip(1) {
            assert!(spec.success < TABLE.len());
            assert!(spec.fail < TABLE.len());
        }
    }

    #[test]
    fn incident_window_opens_on_check_internet_steps_only() {
        assert!(marks_incident(5));
        assert!(marks_incident(8));
        assert!(marks_incident(10));
        assert!(!marks_incident(1));
        assert!(!marks_incident(6));
        assert!(!marks_incident(14));
    }

    #[test]
    fn retry_zero_steps_match_open_question_one() {
        assert_eq!(TABLE[8].retry, 0);
        assert_eq!(TABLE[10].retry, 0);
    }

    #[test]
    fn check_sim_ready_only_reachable_from_configure_modem_success() {
        assert_eq!(TABLE[2].success, 14);
        assert_eq!(TABLE[14].success, 3);
    }
}
