//! Configuration loading (§4.6).
//!
//! Read-mostly record shared by all core components. Writes are serialized by
//! this loader's own convention — the core treats [`Configuration`] as frozen
//! for the duration of a supervisor tick.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name of the persisted configuration file within the config directory.
const CONFIG_FILE: &str = "config.yaml";

/// Glob-ish prefix for pending config change sets.
const CONFIG_REQUEST_PREFIX: &str = "config_request";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub verbose_mode: bool,
    pub debug_mode: bool,
    pub apn: String,
    pub sbc: String,
    pub check_internet_interval: u32,
    pub send_monitoring_data_interval: u32,
    pub ping_timeout: u32,
    pub other_ping_timeout: u32,
    pub network_priority: HashMap<String, u32>,
    pub cellular_interfaces: Vec<String>,
    pub acceptable_apns: HashSet<String>,
    pub logger_level: String,

    /// Set when this load differs from the previously held configuration in
    /// any field. Recomputed by [`Configuration::mark_changes_since`]; never
    /// read from or written to `config.yaml` itself.
    #[serde(skip)]
    pub reload_required: bool,
    /// Same condition as `reload_required`, kept as its own flag per the
    /// original source's naming.
    #[serde(skip)]
    pub config_changed: bool,
    /// Set when specifically `apn` or `sbc` changed — the fields
    /// `configure_modem` reads — so a reload can force it to re-run without
    /// waiting for the next natural pass through step 2.
    #[serde(skip)]
    pub modem_config_required: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            verbose_mode: false,
            debug_mode: false,
            apn: "super".to_string(),
            sbc: "rpi4".to_string(),
            check_internet_interval: 60,
            send_monitoring_data_interval: 25,
            ping_timeout: 9,
            other_ping_timeout: 3,
            network_priority: HashMap::from([
                ("eth0".to_string(), 1),
                ("wlan0".to_string(), 2),
                ("wwan0".to_string(), 3),
                ("usb0".to_string(), 4),
            ]),
            cellular_interfaces: vec!["wwan0".to_string(), "usb0".to_string()],
            acceptable_apns: HashSet::from([
                "super".to_string(),
                "de1.super".to_string(),
                "sg1.super".to_string(),
            ]),
            logger_level: "debug".to_string(),
            reload_required: false,
            config_changed: false,
            modem_config_required: false,
        }
    }
}

impl Configuration {
    /// Load `config.yaml` from `config_dir`, falling back to defaults when
    /// the file is missing or malformed. Any `config_request*.yaml` files
    /// present are merged in, deleted, and the result is written back to
    /// `config.yaml` so the merge only has to happen once per request.
    pub fn load(config_dir: &Path) -> Self {
        let mut config = Self::read_base(config_dir);
        let mut changed = false;

        for request_path in Self::pending_requests(config_dir) {
            match Self::read_request(&request_path) {
                Ok(request) => {
                    config.merge(request);
                    changed = true;
                },
                Err(err) => {
                    warn!(path = %request_path.display(), %err, "malformed config request, skipping")
                },
            }

            if let Err(err) = std::fs::remove_file(&request_path) {
                warn!(path = %request_path.display(), %err, "failed to remove consumed config request");
            }
        }

        if changed {
            if let Err(err) = config.save(config_dir) {
                warn!(%err, "failed to persist configuration after merging pending requests");
            }
        }

        config
    }

    fn read_base(config_dir: &Path) -> Self {
        let path = config_dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str(&contents).unwrap_or_else(|err| {
                warn!(%err, "config.yaml is malformed, using defaults");
                Self::default()
            }),
            Err(_) => {
                warn!(path = %path.display(), "config file doesn't exist, using defaults");
                Self::default()
            },
        }
    }

    fn pending_requests(config_dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(config_dir) else {
            return Vec::new();
        };

        let mut requests: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(CONFIG_REQUEST_PREFIX))
            })
            .collect();
        requests.sort();
        requests
    }

    fn read_request(path: &Path) -> Result<ConfigRequest, serde_yaml::Error> {
        let contents = std::fs::read_to_string(path).unwrap_or_default();
        serde_yaml::from_str(&contents)
    }

    /// Merge a partial change set in: a present field overrides the base
    /// value, an absent one leaves it untouched.
    fn merge(&mut self, request: ConfigRequest) {
        if let Some(apn) = request.apn {
            self.apn = apn;
        }
        if let Some(sbc) = request.sbc {
            self.sbc = sbc;
        }
        if let Some(interval) = request.check_internet_interval {
            self.check_internet_interval = interval;
        }
        if let Some(verbose) = request.verbose_mode {
            self.verbose_mode = verbose;
        }
        if let Some(debug) = request.debug_mode {
            self.debug_mode = debug;
        }
    }

    /// Recompute the change-tracking flags against the previously held
    /// configuration. `reload_required`/`config_changed` mirror whether any
    /// field differs; `modem_config_required` narrows to the fields
    /// `configure_modem` actually reads, so the supervisor can force a
    /// re-run of that step without waiting for its natural turn.
    pub fn mark_changes_since(&mut self, previous: &Configuration) {
        let modem_relevant_changed = self.apn != previous.apn || self.sbc != previous.sbc;
        let changed = modem_relevant_changed
            || self.check_internet_interval != previous.check_internet_interval
            || self.send_monitoring_data_interval != previous.send_monitoring_data_interval
            || self.ping_timeout != previous.ping_timeout
            || self.other_ping_timeout != previous.other_ping_timeout
            || self.network_priority != previous.network_priority
            || self.cellular_interfaces != previous.cellular_interfaces
            || self.acceptable_apns != previous.acceptable_apns
            || self.logger_level != previous.logger_level
            || self.verbose_mode != previous.verbose_mode
            || self.debug_mode != previous.debug_mode;

        self.config_changed = changed;
        self.reload_required = changed;
        self.modem_config_required = modem_relevant_changed;
    }

    /// Atomically rewrite `config.yaml` in `config_dir`.
    pub fn save(&self, config_dir: &Path) -> std::io::Result<()> {
        let contents = serde_yaml::to_string(self).expect("Configuration always serializes");
        let final_path = config_dir.join(CONFIG_FILE);
        let tmp_path = config_dir.join(format!("{CONFIG_FILE}.tmp"));
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(tmp_path, final_path)
    }
}

/// A pending, partial configuration change set (`config_request*.yaml`).
#[derive(Debug, Default, Deserialize)]
struct ConfigRequest {
    apn: Option<String>,
    sbc: Option<String>,
    check_internet_interval: Option<u32>,
    verbose_mode: Option<bool>,
    debug_mode: Option<bool>,
}
