//! missingdrop-device: host runner for the device connection supervisor.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use missingdrop_common::{DropError, PairId, Role};
use missingdrop_config::{validation, MissingDropConfig};
use missingdrop_device::{
    HostLink, LogIndicator, PanelBuffer, Supervisor, SupervisorConfig, TestPattern, TickOutcome,
    WsSocket,
};
use tokio::time::{Interval, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVE: &str = "missingdrop_device=info";

#[derive(Parser, Debug)]
#[command(name = "missingdrop-device", version, about = "Relay endpoint runner")]
struct Args {
    /// Config file path override.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay host name or address.
    #[arg(long)]
    host: Option<String>,

    /// Relay port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Role to join as (producer, display).
    #[arg(long)]
    role: Option<Role>,

    /// Pair to join.
    #[arg(long)]
    pair: Option<u8>,

    /// Test pattern frames per second in producer role (0 disables).
    #[arg(long)]
    pattern_fps: Option<u32>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut MissingDropConfig) {
        let device = &mut config.device;
        if let Some(host) = &self.host {
            device.server_host = host.clone();
        }
        if let Some(port) = self.port {
            device.server_port = port;
        }
        if let Some(role) = self.role {
            device.role = role;
        }
        if let Some(pair) = self.pair {
            device.pair = PairId(pair);
        }
        if let Some(fps) = self.pattern_fps {
            device.pattern_fps = fps;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("missingdrop_device={level}"))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves when the pattern interval fires, never when there is none.
async fn pattern_due(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DropError> {
    let args = Args::parse();

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

    let device = &config.device;
    let width = usize::from(device.frame_width);
    let height = usize::from(device.frame_height);

    let mut supervisor = Supervisor::new(
        SupervisorConfig::from_device(device),
        HostLink::new(device.network.clone()),
        WsSocket::new(),
        LogIndicator::default(),
        PanelBuffer::new(width, height),
    );
    tracing::info!(
        url = %device.server_url(),
        role = %device.role,
        pair = %device.pair,
        "missingdrop-device v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(device.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pattern = TestPattern::new(width, height);
    let mut pattern_ticker = (device.role == Role::Producer && device.pattern_fps > 0).then(|| {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(1) / device.pattern_fps.max(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if supervisor.tick(Instant::now()) == TickOutcome::Restart {
                    supervisor.restart();
                }
            }
            _ = pattern_due(&mut pattern_ticker) => {
                supervisor.send_frame(pattern.next_frame());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    supervisor.shutdown();
    tracing::info!(frames = supervisor.sink().frame_count(), "Frames shown");
    // Let the socket task flush its close frame.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
