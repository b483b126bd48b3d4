//! Metrics endpoint handler for Prometheus scraping.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error};

use crate::qbit::TorrentSource;
use crate::scrape::ScrapeError;
use crate::state::SharedState;

impl IntoResponse for ScrapeError {
    fn into_response(self) -> axum::response::Response {
        error!("scrape failed: {self}");
        let status = match &self {
            ScrapeError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ScrapeError::Encode(_) | ScrapeError::Utf8(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, format!("scrape failed: {self}")).into_response()
    }
}

/// Handler for the /metrics endpoint. A scrape failure maps to a 5xx
/// response and leaves the registry's previous values in place.
pub async fn metrics_handler<C>(
    State(state): State<SharedState<C>>,
) -> Result<impl IntoResponse, ScrapeError>
where
    C: TorrentSource + Send + Sync + 'static,
{
    debug!("Processing /metrics request");
    let body = state.scraper.scrape().await?;
    let content_type = TextEncoder::new().format_type().to_string();
    Ok(([(header::CONTENT_TYPE, content_type)], body))
}

/// Fallback handler for every route other than /metrics.
pub async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
