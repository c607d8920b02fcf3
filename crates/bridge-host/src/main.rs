//! Input bridge host: entry point.
//!
//! Wires the capture source, the input router, and the host connection role
//! together and runs them on the Tokio runtime until Ctrl+C or `quit`.
//!
//! # Usage
//!
//! ```text
//! bridge-host [OPTIONS]
//!
//! Options:
//!   --config <PATH>     config.toml to load [default: platform config dir]
//!   --secret <SECRET>   shared secret, overrides security.shared_secret
//!   --port <PORT>       stream port, overrides network.reliable_port
//!   --no-console        do not read commands from stdin
//! ```
//!
//! Every option can also come from the environment (`INPUTBRIDGE_CONFIG`,
//! `INPUTBRIDGE_SECRET`, `INPUTBRIDGE_PORT`). `RUST_LOG` overrides the
//! configured log level.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  ├─ ChannelInputSource ──► capture pump ──► InputRouter ──► Generation
//!  ├─ Console (stdin)    ──┘                     ▲
//!  └─ ConnectionManager<HostRole>  (beacon, accept, handshake, heartbeat)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bridge_core::{default_config_path, load_config, AppConfig};
use bridge_host::application::route_input::{run_capture_pump, InputRouter, RouterNotice};
use bridge_host::infrastructure::console::Console;
use bridge_host::infrastructure::input_capture::channel::ChannelInputSource;
use bridge_host::infrastructure::input_capture::InputSource;
use bridge_host::infrastructure::network::{HostRole, HostSettings};
use bridge_net::{ConnectionManager, LocalIdentity, SessionTiming};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Shares this machine's keyboard and mouse with a client on the LAN.
#[derive(Debug, Parser)]
#[command(name = "bridge-host", version)]
struct Cli {
    /// Path to config.toml. Missing files fall back to built-in defaults.
    #[arg(long, env = "INPUTBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Pre-shared secret; must match the client's.
    #[arg(long, env = "INPUTBRIDGE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// TCP port for the stream listener. Mouse datagrams use the port below.
    #[arg(long, env = "INPUTBRIDGE_PORT")]
    port: Option<u16>,

    /// Run without the stdin control console.
    #[arg(long)]
    no_console: bool,
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

    info!(version = env!("CARGO_PKG_VERSION"), "input bridge host starting");
    if config.security.uses_default_secret() {
        warn!("using the default shared secret; set security.shared_secret or --secret");
    }

    let identity = LocalIdentity::from_environment();
    let settings = HostSettings::from_config(&config, identity.hostname.clone())
        .context("invalid network settings")?;

    // ── Capture and routing ───────────────────────────────────────────────────
    let source = Arc::new(ChannelInputSource::new());
    let captured = source.start().context("starting input capture")?;
    let (router, mut notices) = InputRouter::new(source.clone());
    let router = Arc::new(Mutex::new(router));

    let cancel = CancellationToken::new();
    tokio::spawn(run_capture_pump(router.clone(), captured, cancel.clone()));
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice {
                RouterNotice::SwitchRejected => warn!("no client connected; staying local"),
                RouterNotice::FellBackToLocal { reason } => {
                    warn!(%reason, "input returned to this machine")
                }
            }
        }
    });

    // ── Connection manager ────────────────────────────────────────────────────
    let role = Arc::new(HostRole::new(settings, router.clone()));
    let manager = ConnectionManager::new(
        role,
        identity,
        config.security.secret(),
        SessionTiming::from_config(&config.timing),
    );

    // ── Console ───────────────────────────────────────────────────────────────
    if !cli.no_console {
        let console = Console {
            router: router.clone(),
            source: source.clone(),
            state: manager.subscribe_state(),
            latency: manager.subscribe_latency(),
        };
        let token = cancel.clone();
        tokio::spawn(async move {
            console.run(BufReader::new(tokio::io::stdin()), token).await;
        });
    }

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

    manager.run(cancel.clone()).await;

    router.lock().await.emergency_release().await;
    source.stop();
    info!("input bridge host stopped");
    Ok(())
}
