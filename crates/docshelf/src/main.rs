//! Docshelf server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docshelf::DocumentManager;
use docshelf::auth::ApiKeyGuard;
use docshelf::blob::FsBlobStore;
use docshelf::config::Config;
use docshelf::record;
use docshelf::report::{self, UsageReporter};
use docshelf::server::{self, AppState};

#[derive(Parser)]
#[command(name = "docshelf", version, about = "Self-hosted document store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Path to the YAML config file
        #[arg(short, long, default_value = "docshelf.yaml")]
        config: PathBuf,

        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Override `server.port`
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print a usage report once and exit
    Report {
        /// Path to the YAML config file
        #[arg(short, long, default_value = "docshelf.yaml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docshelf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Serve { config, host, port } => serve(config, host, port).await,
        Command::Report { config } => print_report(config).await,
    }
}

async fn serve(config_path: PathBuf, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let api_key = config.auth.resolve_api_key()?;
    let records = record::open(&config.storage.records).context("opening record store")?;
    let blobs = Arc::new(FsBlobStore::new(&config.storage.upload_dir));

    let report_task = if config.report.enabled {
        let schedule = report::parse_schedule(&config.report.schedule)?;
        let reporter = Arc::new(UsageReporter::new(Arc::clone(&records)));
        info!(schedule = %config.report.schedule, "Usage report enabled");
        Some(report::spawn_report_task(reporter, schedule))
    } else {
        None
    };

    let state = AppState {
        documents: DocumentManager::new(records, blobs),
        guard: ApiKeyGuard::new(api_key),
    };
    let app = server::build_app(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        %addr,
        upload_dir = %config.storage.upload_dir.display(),
        backend = ?config.storage.records.backend,
        "Docshelf listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = report_task {
        task.abort();
    }
    info!("Docshelf stopped");
    Ok(())
}

async fn print_report(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;
    let records = record::open(&config.storage.records).context("opening record store")?;
    let reporter = UsageReporter::new(records);

    let summary = tokio::task::spawn_blocking(move || reporter.summarize()).await??;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
