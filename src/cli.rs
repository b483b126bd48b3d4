//! CLI arguments for qbit-exporter.
//!
//! Every flag has an environment-variable fallback resolved in
//! [`crate::config`]; flags win over the environment.

use clap::{Parser, ValueEnum};

/// Log level options for CLI parsing
#[derive(Debug, Clone, Default, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "qbit-exporter",
    about = "Prometheus exporter for qBittorrent torrent and peer statistics",
    version,
    propagate_version = true
)]
pub struct Args {
    /// qBittorrent WebUI base URL (fallback: QBIT_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// qBittorrent WebUI username (fallback: QBIT_USER)
    #[arg(long)]
    pub username: Option<String>,

    /// qBittorrent WebUI password (fallback: QBIT_PASS)
    #[arg(long)]
    pub password: Option<String>,

    /// HTTP listen port (fallback: LISTEN_PORT)
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP (fallback: BIND_ADDR)
    #[arg(long)]
    pub bind: Option<String>,

    /// Metric name prefix (fallback: PROMETHEUS_PREFIX)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
