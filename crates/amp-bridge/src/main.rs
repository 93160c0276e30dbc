//! Amplifier relay bridge: entry point.
//!
//! Accepts WebSocket connections from control panels, serialises their
//! commands to the relay helper program, and keeps every panel in sync with
//! the amplifier's cached state.
//!
//! # Usage
//!
//! ```text
//! amp-bridge [OPTIONS]
//!
//! Options:
//!   --config          <FILE>  Optional TOML configuration file
//!   --ws-bind         <IP>    Address to bind [default: 0.0.0.0]
//!   --ws-port         <PORT>  WebSocket listener port [default: 8090]
//!   --extension       <NAME>  Bus topic owned by this bridge [default: akai_amp]
//!   --helper          <PATH>  Relay helper program [default: akai_amp.py]
//!   --status-command  <ARGS>  Helper arguments that print the relay status
//!   --command-timeout <SECS>  Per-call timeout, 0 disables [default: 30]
//! ```
//!
//! # Precedence
//!
//! Explicit CLI arguments win, then their environment variables, then the
//! TOML file, then the built-in defaults.
//!
//! | Variable              | Flag                |
//! |-----------------------|---------------------|
//! | `AMP_CONFIG`          | `--config`          |
//! | `AMP_WS_BIND`         | `--ws-bind`         |
//! | `AMP_WS_PORT`         | `--ws-port`         |
//! | `AMP_EXTENSION`       | `--extension`       |
//! | `AMP_HELPER`          | `--helper`          |
//! | `AMP_STATUS_COMMAND`  | `--status-command`  |
//! | `AMP_COMMAND_TIMEOUT` | `--command-timeout` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use amp_bridge::application::{RequestRouter, StateStore};
use amp_bridge::domain::config::timeout_from_secs;
use amp_bridge::domain::{BridgeConfig, FileConfig};
use amp_bridge::infrastructure::{
    load_file_config, run_server, BusAdapter, BusPublisher, MessageBus, ProcessExecutor,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Amplifier relay bridge.
///
/// Every setting is optional so that an unset flag falls through to the
/// config file instead of masking it with a clap default.
#[derive(Debug, Default, Parser)]
#[command(
    name = "amp-bridge",
    about = "Serialises amplifier relay commands and keeps control panels in sync",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "AMP_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket gateway to.
    #[arg(long, env = "AMP_WS_BIND")]
    ws_bind: Option<String>,

    /// TCP port for the WebSocket gateway.
    #[arg(long, env = "AMP_WS_PORT")]
    ws_port: Option<u16>,

    /// Bus topic this bridge answers on.
    #[arg(long, env = "AMP_EXTENSION")]
    extension: Option<String>,

    /// Path or name of the relay helper program.
    #[arg(long, env = "AMP_HELPER")]
    helper: Option<PathBuf>,

    /// Helper arguments that print the relay status, e.g. "status short".
    #[arg(long, env = "AMP_STATUS_COMMAND")]
    status_command: Option<String>,

    /// Seconds to wait for one helper call.  0 waits forever.
    #[arg(long, env = "AMP_COMMAND_TIMEOUT")]
    command_timeout: Option<u64>,
}

impl Cli {
    /// Layers CLI values over `file` over [`BridgeConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is not a valid IP address.
    fn into_bridge_config(self, file: FileConfig) -> anyhow::Result<BridgeConfig> {
        let defaults = BridgeConfig::default();

        let ip = match self.ws_bind.or(file.server.bind) {
            Some(text) => text
                .parse::<IpAddr>()
                .with_context(|| format!("invalid WebSocket bind address: '{text}'"))?,
            None => defaults.ws_bind_addr.ip(),
        };
        let port = self
            .ws_port
            .or(file.server.port)
            .unwrap_or(defaults.ws_bind_addr.port());

        let command_timeout = match self.command_timeout.or(file.amplifier.command_timeout_secs) {
            Some(secs) => timeout_from_secs(secs),
            None => defaults.command_timeout,
        };

        Ok(BridgeConfig {
            ws_bind_addr: SocketAddr::new(ip, port),
            extension_name: self
                .extension
                .or(file.amplifier.extension)
                .unwrap_or(defaults.extension_name),
            helper_program: self
                .helper
                .or(file.amplifier.helper_program)
                .unwrap_or(defaults.helper_program),
            status_command: self
                .status_command
                .or(file.amplifier.status_command)
                .unwrap_or(defaults.status_command),
            command_timeout,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => load_file_config(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = cli.into_bridge_config(file)?;

    info!(
        "amplifier bridge starting: ws={}, extension={}, helper={}",
        config.ws_bind_addr,
        config.extension_name,
        config.helper_program.display()
    );

    // ── Wiring ────────────────────────────────────────────────────────────────
    let bus = MessageBus::default();
    let store = Arc::new(StateStore::new());
    let executor = Arc::new(ProcessExecutor::new(config.helper_program.clone()));
    let publisher = Arc::new(BusPublisher::new(bus.clone(), config.extension_name.clone()));
    let router = RequestRouter::new(store, executor, publisher)
        .with_timeout(config.command_timeout)
        .with_status_command(config.status_command.clone());
    let adapter = BusAdapter::new(config.extension_name.clone(), router.clone());

    // Seed the cache before any request is routed, so the status read never
    // overlaps a mutating call.  On failure the cached power state stays "off".
    if let Err(e) = router.refresh_from_hardware().await {
        warn!("could not read initial relay status: {e}");
    }

    tokio::spawn(adapter.run(bus.subscribe_inbound()));

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(config.ws_bind_addr, bus, running).await?;

    info!("amplifier bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
