//! Composition worker binary.
//!
//! Reads a `CompositionRequest` as JSON from a file argument or stdin, runs
//! it, and prints the resulting `ComposedArtifact` as JSON.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use duet_media::ProcessToolchain;
use duet_models::CompositionRequest;
use duet_storage::{ArtifactPublisher, MemoryPublisher, R2Publisher};
use duet_worker::{Composer, ComposerConfig, RunControl};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    if let Err(e) = run().await {
        error!("duet-compose failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("duet=info".parse().expect("static directive"));

    // Logs go to stderr; stdout carries the artifact JSON.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let request_path = args.iter().find(|a| !a.starts_with("--"));

    info!("Starting duet-compose");

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid METRICS_ADDR '{}': {}", addr, e))?;
        duet_worker::metrics::init_metrics(addr)?;
        info!("Metrics exporter listening on {}", addr);
    }

    let request = read_request(request_path.map(String::as_str))?;

    let config = ComposerConfig::from_env();
    info!("Composer config: {:?}", config);

    let toolchain = ProcessToolchain::new(config.tool_paths()?).with_timeout(config.tool_timeout);

    let publisher: Arc<dyn ArtifactPublisher> = if dry_run {
        warn!("Dry run: artifacts are kept in memory and not published");
        Arc::new(MemoryPublisher::new())
    } else {
        Arc::new(R2Publisher::from_env()?)
    };

    let composer = Composer::new(config, Arc::new(toolchain), publisher);

    // Ctrl-C cancels the run; children are killed and the workspace removed.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = cancel_tx.send(true);
        }
    });

    let artifact = composer
        .compose_with(&request, RunControl::default().with_cancel(cancel_rx))
        .await?;

    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}

fn read_request(path: Option<&str>) -> anyhow::Result<CompositionRequest> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read request file {}: {}", path, e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("malformed composition request: {}", e))
}
