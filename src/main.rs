//! Process entrypoint (§4.0): CLI parsing, logging setup, configuration
//! load, and the supervisor tick loop.

mod conductor;
mod config;
mod error;
mod hardware;
mod modem;
mod sbc;
mod supervisor;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::{Mutex, oneshot};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Configuration;
use crate::supervisor::{manage_connections, SupervisorContext};
use crate::transport::SystemTransport;

/// Supervisory daemon for cellular USB modems on single-board-computer edge
/// devices.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding `config.yaml` and pending `config_request*.yaml` files.
    #[arg(long, default_value = "/etc/modemd")]
    config_dir: PathBuf,

    /// Directory holding `system.yaml` and diagnostic reports.
    #[arg(long, default_value = "/var/lib/modemd")]
    state_dir: PathBuf,

    /// Increase log verbosity. Repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress the startup banner aimed at interactive terminals. The
    /// daemon never self-backgrounds; this only affects log output.
    #[arg(long)]
    foreground: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.foreground {
        info!("modemd starting");
    }

    let config = Configuration::load(&cli.config_dir);
    let sbc = match sbc::lookup(&config.sbc) {
        Some(sbc) => sbc,
        None => bail!("unknown single-board computer {:?}, aborting startup", config.sbc),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run(config, sbc, cli.config_dir, cli.state_dir));

    Ok(())
}

fn init_logging(verbose: u8) {
    let default_directive = match verbose {
        0 => "modemd=info",
        1 => "modemd=debug",
        _ => "modemd=trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: Configuration, sbc: sbc::SbcProfile, config_dir: PathBuf, state_dir: PathBuf) {
    let gpio_pin = sbc.modem_disable_gpio_pin;
    let context =
        Arc::new(Mutex::new(SupervisorContext::new(config, sbc, config_dir, state_dir, Arc::new(SystemTransport))));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(wait_for_shutdown_signal(shutdown_tx));

    manage_connections(context, shutdown_rx).await;

    modem::gpio::teardown(gpio_pin);

    info!("modemd stopped");
}

/// Resolve once either SIGTERM or SIGINT arrives, letting the supervisor loop
/// observe it at its next sleep boundary (§5).
async fn wait_for_shutdown_signal(shutdown_tx: oneshot::Sender<()>) {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(err) => {
            error!(%err, "failed to install SIGTERM handler");
            return;
        },
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
    }

    let _ = shutdown_tx.send(());
}
