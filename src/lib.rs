//! qbit-exporter - Prometheus exporter for qBittorrent.
//!
//! On every `/metrics` request the exporter polls the qBittorrent WebUI API
//! and republishes the returned state as labeled gauges: one series per
//! torrent for speeds, swarm counts, ratio, progress, byte totals and
//! timing fields, plus per-peer series aggregated across torrents.
//!
//! The crate is split along the scrape pipeline:
//!
//! - [`qbit`]: upstream WebUI client and payload types
//! - [`schema`]: the static field-to-metric mapping table
//! - [`metrics`]: registered Prometheus instruments
//! - [`scrape`]: the per-request fetch/reset/populate/render cycle
//! - [`handlers`]: the axum front door
//! - [`config`] / [`cli`]: startup configuration

pub mod cli;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod qbit;
pub mod schema;
pub mod scrape;
pub mod state;
