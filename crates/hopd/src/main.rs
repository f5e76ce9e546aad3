//! hopd — the hopgate daemon.
//!
//! Loads CONNECT rules from one or more rule files, then serves CONNECT
//! tunnels and the rule control API on a single HTTP listener.
//!
//! # Usage
//!
//! ```text
//! hopd --bind 0.0.0.0:9000 /etc/hopgate/rules.conf
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use hop_core::loader::{load_rule_files, process_env};
use hop_core::{GatewayConfig, RuleTable};
use hopgate_gateway::{Gateway, RequestRouter};
use hopgate_tunnel::TunnelHandler;

const DEFAULT_LOG_FILTER: &str = "info,hopd=debug,hopgate=debug,hop_core=debug";

#[derive(Parser, Debug)]
#[command(
    name = "hopd",
    about = "Expose registered TCP backends behind an HTTP CONNECT endpoint",
    version
)]
struct Cli {
    /// Address to listen on (default 0.0.0.0:9000).
    #[arg(short, long, env = "HOPGATE_BIND")]
    bind: Option<SocketAddr>,

    /// Optional hopgate.toml with daemon settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve CONNECT only; answer every other request with 404.
    #[arg(long)]
    no_control_api: bool,

    /// Give up dialing a backend after this many seconds.
    #[arg(long)]
    dial_timeout: Option<u64>,

    /// Rule files, expanded against the environment then parsed as
    /// `<service> <host:port>` lines.
    rules: Vec<PathBuf>,
}

impl Cli {
    /// Apply command line overrides on top of the file config.
    fn resolve(self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if self.no_control_api {
            config.control_api = false;
        }
        if self.dial_timeout.is_some() {
            config.dial_timeout_secs = self.dial_timeout;
        }
        config.rules.extend(self.rules);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    let config = cli.resolve(file_config);

    run(config).await
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let rules = RuleTable::new();
    rules.extend(load_rule_files(&config.rules, &process_env())?);
    info!(count = rules.len(), "rules loaded");

    let tunnel = TunnelHandler::new(rules.clone()).with_dial_timeout(config.dial_timeout());
    let control = config
        .control_api
        .then(|| hopgate_api::build_router(rules.clone()));
    if control.is_none() {
        info!("control API disabled");
    }

    let gateway = Gateway::bind(config.bind, RequestRouter::new(tunnel, control)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    gateway.serve(shutdown_rx).await?;

    info!("hopd stopped");
    Ok(())
}
