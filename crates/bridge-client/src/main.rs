//! Input bridge client: entry point.
//!
//! Finds a host on the LAN (or connects to `--host`), authenticates, and
//! replays the host's input until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! bridge-client [OPTIONS]
//!
//! Options:
//!   --config <PATH>     config.toml to load [default: platform config dir]
//!   --secret <SECRET>   shared secret, overrides security.shared_secret
//!   --host <IP>         skip discovery and connect to this host
//!   --port <PORT>       host stream port used with --host, overrides
//!                       network.reliable_port
//! ```
//!
//! Every option can also come from the environment (`INPUTBRIDGE_CONFIG`,
//! `INPUTBRIDGE_SECRET`, `INPUTBRIDGE_HOST`, `INPUTBRIDGE_PORT`). `RUST_LOG`
//! overrides the configured log level.
//!
//! # Input injector
//!
//! This build replays input through `LoggingInjector`, which logs each event
//! instead of synthesizing it. A platform injector plugs in at the same
//! place by implementing `InputInjector`.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bridge_client::application::dispatch_input::InputDispatcher;
use bridge_client::infrastructure::input_injection::logging::LoggingInjector;
use bridge_client::infrastructure::network::{ClientRole, ClientSettings};
use bridge_core::{default_config_path, load_config, AppConfig};
use bridge_net::{ConnectionManager, LocalIdentity, SessionTiming};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Lets a host on the LAN drive this machine's keyboard and mouse.
#[derive(Debug, Parser)]
#[command(name = "bridge-client", version)]
struct Cli {
    /// Path to config.toml. Missing files fall back to built-in defaults.
    #[arg(long, env = "INPUTBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Pre-shared secret; must match the host's.
    #[arg(long, env = "INPUTBRIDGE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Connect to this host directly instead of listening for beacons.
    #[arg(long, env = "INPUTBRIDGE_HOST")]
    host: Option<IpAddr>,

    /// The host's stream port when `--host` is given.
    #[arg(long, env = "INPUTBRIDGE_PORT")]
    port: Option<u16>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match self.config.clone().or_else(default_config_path) {
            Some(path) => load_config(&path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AppConfig::default(),
        };
        if let Some(secret) = &self.secret {
            config.security.shared_secret = secret.clone();
        }
        if let Some(port) = self.port {
            config.network.reliable_port = port;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn direct_host(&self, config: &AppConfig) -> Option<SocketAddr> {
        self.host
            .map(|ip| SocketAddr::new(ip, config.network.reliable_port))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Structured logging. `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "input bridge client starting");
    if config.security.uses_default_secret() {
        warn!("using the default shared secret; set security.shared_secret or --secret");
    }

    let dispatcher = Arc::new(InputDispatcher::new(Arc::new(LoggingInjector::new())));
    let settings = ClientSettings::from_config(&config).with_host(cli.direct_host(&config));
    if let Some(host) = settings.host {
        info!(%host, "discovery disabled, using fixed host");
    }

    let manager = ConnectionManager::new(
        Arc::new(ClientRole::new(settings, dispatcher.clone())),
        LocalIdentity::from_environment(),
        config.security.secret(),
        SessionTiming::from_config(&config.timing),
    );
    let cancel = CancellationToken::new();

    // ── Status reporting ──────────────────────────────────────────────────────
    tokio::spawn({
        let mut control = dispatcher.subscribe_control();
        let mut latency = manager.subscribe_latency();
        async move {
            loop {
                tokio::select! {
                    changed = control.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let controlled = *control.borrow_and_update();
                        info!(controlled, "control indicator");
                    }
                    changed = latency.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Some(ms) = *latency.borrow_and_update() {
                            tracing::debug!(latency_ms = ms, "latency sample");
                        }
                    }
                }
            }
        }
    });

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::spawn({
        let token = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "Ctrl+C handler unavailable"),
            }
        }
    });

    manager.run(cancel).await;
    info!("input bridge client stopped");
    Ok(())
}
