//! artifact-broker server binary
//!
//! Reads its settings from the environment (optionally overridden on the
//! command line), starts the expiration sweeper and serves the HTTP API
//! until SIGINT/SIGTERM.

use artifact_broker::config::{ENV_BINARY, ENV_PORT, ENV_WORK_DIR, resolve_binary_path};
use artifact_broker::{ArtifactBroker, Config, run_with_shutdown};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "artifact-broker", version, about)]
struct Args {
    /// Port to listen on (all interfaces)
    #[arg(long, env = ENV_PORT)]
    port: Option<u16>,

    /// External tool to run on each upload
    #[arg(long = "bin", env = ENV_BINARY)]
    binary: Option<PathBuf>,

    /// Directory holding the per-job workspaces
    #[arg(long, env = ENV_WORK_DIR)]
    work_dir: Option<PathBuf>,

    /// Minutes a finished job stays downloadable
    #[arg(long)]
    ttl_minutes: Option<u64>,

    /// Seconds the tool may run before it is killed
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Serve Swagger UI at /swagger-ui
    #[arg(long)]
    swagger_ui: bool,
}

fn ttl_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

fn build_config(args: Args) -> artifact_broker::Result<Config> {
    let base_dir = std::env::current_dir()?;
    let mut config = Config::from_env(&base_dir)?;

    if let Some(port) = args.port {
        config.api.bind_address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    }
    if let Some(binary) = args.binary {
        config.tool.binary_path = binary;
    }
    if let Some(work_dir) = args.work_dir {
        config.storage.work_dir = base_dir.join(work_dir);
    }
    if let Some(minutes) = args.ttl_minutes {
        config.retention.ttl = ttl_from_minutes(minutes);
    }
    if let Some(secs) = args.timeout_secs {
        config.tool.timeout = Duration::from_secs(secs);
    }
    config.api.swagger_ui |= args.swagger_ui;

    // A missing tool is not fatal; every job reports it until it appears
    match resolve_binary_path(&config.tool.binary_path, &base_dir) {
        Ok(resolved) => config.tool.binary_path = resolved,
        Err(e) => {
            config.tool.binary_path = base_dir.join(&config.tool.binary_path);
            tracing::warn!(error = %e, "external tool not found, jobs will fail until it is installed");
        }
    }

    Ok(config)
}

async fn run(args: Args) -> artifact_broker::Result<()> {
    let config = build_config(args)?;
    tracing::info!(
        binary = %config.tool.binary_path.display(),
        work_dir = %config.storage.work_dir.display(),
        "configuration loaded"
    );

    let broker = ArtifactBroker::new(config).await?;
    let sweeper = broker.start_sweeper();

    tokio::spawn({
        let broker = broker.clone();
        async move {
            if let Err(e) = run_with_shutdown(broker).await {
                tracing::error!(error = %e, "shutdown failed");
            }
        }
    });

    let served = artifact_broker::api::start_api_server(broker.clone()).await;

    // The server may also stop on a bind or accept error
    broker.shutdown().await?;
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "sweeper task ended abnormally");
    }

    served
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "artifact-broker exited with an error");
            ExitCode::FAILURE
        }
    }
}
