//! HTTP endpoint handlers for the exporter.
//!
//! Single-route dispatch: `GET /metrics` runs a scrape and returns the
//! rendered registry; every other path falls through to a plain 404.

pub mod metrics;

use axum::routing::get;
use axum::Router;

use crate::qbit::TorrentSource;
use crate::state::SharedState;

pub use metrics::{metrics_handler, not_found_handler};

/// Builds the application router.
pub fn router<C>(state: SharedState<C>) -> Router
where
    C: TorrentSource + Send + Sync + 'static,
{
    // The method-router fallback keeps non-GET requests to /metrics on the
    // same 404 path as unknown routes.
    Router::new()
        .route("/metrics", get(metrics_handler::<C>).fallback(not_found_handler))
        .fallback(not_found_handler)
        .with_state(state)
}
