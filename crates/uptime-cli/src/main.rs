mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use uptime_api::state::AppState;
use uptime_core::{FileStore, MemoryStore, RecordStore, ServiceConfig, Services};

use crate::config::{AppConfig, StoreKind};

/// Uptime monitor: users, session tokens and monitored checks over HTTP.
#[derive(Parser)]
#[command(name = "uptime-monitor", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a single scan over a file-backed store and print the report.
    Scan {
        /// Directory holding the users/, tokens/ and checks/ collections.
        #[arg(long)]
        data_dir: PathBuf,
    },
    /// Delete expired tokens from a file-backed store.
    PurgeTokens {
        /// Directory holding the users/, tokens/ and checks/ collections.
        #[arg(long)]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => {
            run_serve(listen, config).await;
        }
        Commands::Scan { data_dir } => {
            init_quiet_tracing();
            run_scan(&data_dir).await;
        }
        Commands::PurgeTokens { data_dir } => {
            init_quiet_tracing();
            run_purge(&data_dir).await;
        }
    }
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<PathBuf>) {
    let app_config = if let Some(ref path) = config_path {
        match AppConfig::load(path) {
            Ok(c) => {
                init_tracing(&c.server.log_format);
                tracing::info!(path = %path.display(), "Loaded config file");
                c
            }
            Err(e) => {
                init_tracing("pretty");
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        init_tracing("pretty");
        AppConfig::default()
    };

    let listen = listen_override.unwrap_or(app_config.server.listen);

    let store: Arc<dyn RecordStore> = match app_config.store.kind {
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; records are lost on shutdown");
            Arc::new(MemoryStore::new())
        }
        StoreKind::File => {
            let Some(ref dir) = app_config.store.data_dir else {
                tracing::error!("store.data_dir is required for a file store");
                std::process::exit(1);
            };
            match open_file_store(dir).await {
                Ok(store) => {
                    tracing::info!(data_dir = %dir.display(), "Using file store");
                    Arc::new(store)
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let services = Services::new(store, app_config.to_service_config());
    let mut state = AppState::new(services.clone());

    let scanner = if app_config.scanner.enabled {
        let scanner = Arc::new(services.scanner());
        if let Err(e) = scanner.start().await {
            tracing::error!(error = %e, "Failed to start check scanner");
            std::process::exit(1);
        }
        state = state.with_scanner(Arc::clone(&scanner));
        Some(scanner)
    } else {
        tracing::info!("Check scanner disabled");
        None
    };

    tracing::info!(%listen, "Starting uptime monitor API server");
    if let Err(e) = uptime_api::serve_with_state(listen, state, uptime_api::shutdown_signal()).await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }

    if let Some(scanner) = scanner {
        tracing::info!("Stopping check scanner...");
        scanner.stop().await;
    }

    tracing::info!("Shutdown complete");
}

async fn run_scan(data_dir: &Path) {
    let services = match file_services(data_dir).await {
        Ok(services) => services,
        Err(e) => fail(&e),
    };

    println!(
        "{} {}",
        style("uptime-monitor").bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    println!("  {} {}", style("data:").dim(), style(data_dir.display()).bold());
    println!();

    let Some(report) = services.scanner().tick().await else {
        fail("a scan is already running");
    };

    if let Some(ref e) = report.listing_error {
        fail(&format!("could not list checks: {e}"));
    }

    println!("  {:<12} {}", style("checks").dim(), report.total);
    println!(
        "  {:<12} {}",
        style("well-formed").dim(),
        style(report.well_formed).green()
    );
    let malformed = if report.malformed > 0 {
        style(report.malformed).yellow().bold()
    } else {
        style(report.malformed).dim()
    };
    println!("  {:<12} {}", style("malformed").dim(), malformed);
    let unreadable = if report.unreadable > 0 {
        style(report.unreadable).red().bold()
    } else {
        style(report.unreadable).dim()
    };
    println!("  {:<12} {}", style("unreadable").dim(), unreadable);
    println!("  {:<12} {}ms", style("took").dim(), report.duration_ms());
}

async fn run_purge(data_dir: &Path) {
    let services = match file_services(data_dir).await {
        Ok(services) => services,
        Err(e) => fail(&e),
    };

    match services.auth.purge_expired().await {
        Ok(0) => println!("{}", style("No expired tokens").dim()),
        Ok(n) => println!(
            "{} {} expired token{}",
            style("Purged").green().bold(),
            n,
            if n == 1 { "" } else { "s" }
        ),
        Err(e) => fail(&e.to_string()),
    }
}

async fn open_file_store(dir: &Path) -> Result<FileStore, String> {
    let store = FileStore::new(dir);
    store
        .init()
        .await
        .map_err(|e| format!("Failed to open data directory {}: {}", dir.display(), e))?;
    Ok(store)
}

async fn file_services(data_dir: &Path) -> Result<Services, String> {
    let store = open_file_store(data_dir).await?;
    Ok(Services::new(Arc::new(store), ServiceConfig::default()))
}

fn fail(message: &str) -> ! {
    eprintln!("{} {}", style("error:").red().bold(), message);
    std::process::exit(1);
}

fn init_tracing(log_format: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .init();
        }
    }
}

/// One-shot commands print their own output; only warnings go to the log.
fn init_quiet_tracing() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
