//! qbit-exporter entry point.
//!
//! Resolves configuration, initializes logging, builds the upstream client
//! and scraper, and serves the single-route HTTP front door until SIGINT or
//! SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};

use qbit_exporter::cli::{Args, LogLevel};
use qbit_exporter::config::{resolve_config, validate_effective_config};
use qbit_exporter::handlers;
use qbit_exporter::qbit::QbitClient;
use qbit_exporter::scrape::Scraper;
use qbit_exporter::state::AppState;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Configuration must resolve and validate before anything binds or logs
    // in; a missing QBIT_URL is fatal right here.
    let config = resolve_config(&args)?;
    validate_effective_config(&config)?;

    setup_logging(&args);

    info!("Starting qbit-exporter");
    info!("Scraping qBittorrent at {}", config.base_url);

    let client = QbitClient::new(&config)?;
    let scraper = Scraper::new(client, &config.prefix)?;
    let state = Arc::new(AppState {
        scraper,
        config: Arc::new(config.clone()),
    });

    let app = handlers::router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("qbit-exporter listening on http://{}", addr);

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    info!("qbit-exporter stopped gracefully");
    Ok(())
}
