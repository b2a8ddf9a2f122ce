//! missingdrop-relay: rendezvous hub for producer/display pairs.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use missingdrop_common::DropError;
use missingdrop_config::{validation, MissingDropConfig};
use missingdrop_relay::{serve, serve_status, spawn_liveness_monitor, HubSettings, RelayHub};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVE: &str = "missingdrop_relay=info";

#[derive(Parser, Debug)]
#[command(name = "missingdrop-relay", version, about = "WebSocket relay hub for producer/display pairs")]
struct Args {
    /// Config file path override.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of pairs served.
    #[arg(long)]
    pairs: Option<u8>,

    /// Seconds between liveness sweeps.
    #[arg(long)]
    liveness_interval: Option<u64>,

    /// Port for the HTTP status listener.
    #[arg(long)]
    status_port: Option<u16>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut MissingDropConfig) {
        if let Some(port) = self.port {
            config.hub.port = port;
        }
        if let Some(pairs) = self.pairs {
            config.hub.pairs = pairs;
        }
        if let Some(secs) = self.liveness_interval {
            config.hub.liveness_interval_secs = secs;
        }
        if let Some(port) = self.status_port {
            config.hub.status_port = Some(port);
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("missingdrop_relay={level}"))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), DropError> {
    let args = Args::parse();

    // An explicit path must load; the default location may fall back.
    let loaded = missingdrop_config::load_config(args.config.as_deref());
    let (mut config, load_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) if args.config.is_some() => return Err(e.into()),
        Err(e) => (MissingDropConfig::default(), Some(e)),
    };
    args.apply(&mut config);

    init_tracing(&config.logging.level);
    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Config load failed, using defaults");
    }
    validation::validate(&config)?;

    let hub_config = &config.hub;
    let hub = RelayHub::new(HubSettings::from_config(hub_config));

    let addr = hub_config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        path = %hub_config.path,
        pairs = hub_config.pairs,
        "missingdrop-relay v{} listening",
        env!("CARGO_PKG_VERSION")
    );

    spawn_liveness_monitor(
        hub.clone(),
        Duration::from_secs(hub_config.liveness_interval_secs),
    );

    if let Some(port) = hub_config.status_port {
        let status_addr = format!("{}:{}", hub_config.bind, port);
        let status_listener = TcpListener::bind(&status_addr).await?;
        tracing::info!(addr = %status_addr, "Status listener ready");
        tokio::spawn(serve_status(status_listener, hub.clone()));
    }

    serve(listener, hub, hub_config.path.clone()).await;
    Ok(())
}

