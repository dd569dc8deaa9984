use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use tokio::sync::oneshot;
use tracing::error;
use tracing::info;
use tracing_subscriber::prelude::*;
use vesyncd::Config;
use vesyncd::Engine;
use vesyncd::LoggingConfig;
use vesyncd::api;
use vesyncd::integrations::vesync::capabilities::StaticCapabilities;
use vesyncd::integrations::vesync::classify::classify;
use vesyncd::integrations::vesync::diagnostics::entry_diagnostics;
use vesyncd::integrations::vesync::manager::SnapshotManager;

#[derive(Parser)]
#[command(name = "vesyncd", version, about = "VeSync device daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon
    Run {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "vesyncd.toml")]
        config: PathBuf,
    },

    /// Classify a device snapshot and print the buckets as JSON
    Classify { snapshot: PathBuf },

    /// Print a redacted diagnostics dump of a device snapshot
    Diagnostics { snapshot: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::Classify { snapshot } => {
            init_stderr_logging();
            classify_snapshot(&snapshot)
        }
        Command::Diagnostics { snapshot } => {
            init_stderr_logging();
            print_diagnostics(&snapshot)
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(logging.targets())
        .init();
}

/// Warnings only, kept off stdout so the JSON output stays clean
fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    init_logging(&config.logging);

    info!("vesyncd starting");
    info!("Loaded config from: {}", config_path.display());

    let engine = Arc::new(Engine::new());
    let count = engine.register_integrations_from_config(&config);
    info!("Started {} integrations", count);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let api_task = if config.api.enabled {
        Some(tokio::spawn(api::serve(
            config.api.listen.clone(),
            config.api.port,
            engine.clone(),
            shutdown_rx,
        )))
    } else {
        info!("HTTP API disabled");
        None
    };

    info!("Press Ctrl+C to exit");
    tokio::select! {
        _ = engine.run() => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
    }

    shutdown_tx.send(()).ok();
    if let Some(task) = api_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("HTTP API server failed: {}", e),
            Err(e) => error!("HTTP API task panicked: {}", e),
        }
    }

    engine.shutdown().await;
    info!("vesyncd shutdown complete");
    Ok(())
}

fn classify_snapshot(path: &Path) -> anyhow::Result<()> {
    let caps = StaticCapabilities;
    let snapshot = SnapshotManager::load(path, &caps)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;

    let result = classify(&snapshot, &caps);
    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    Ok(())
}

fn print_diagnostics(path: &Path) -> anyhow::Result<()> {
    let caps = StaticCapabilities;
    let snapshot = SnapshotManager::load(path, &caps)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&entry_diagnostics(&snapshot, &caps))?
    );
    Ok(())
}
