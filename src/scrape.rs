//! Per-scrape aggregation of upstream state into the metric registry.
//!
//! One [`Scraper::scrape`] call performs the whole cycle: fetch the torrent
//! list, fetch peers concurrently for every torrent with connected seeders or
//! leechers, reset the torrent gauges, repopulate everything, and render the
//! registry as Prometheus exposition text. The registry is only touched once
//! all upstream fetches have finished, so a transient upstream failure never
//! wipes the previously served values.

use std::collections::BTreeMap;
use std::string::FromUtf8Error;
use std::time::Instant;

use futures::future::join_all;
use prometheus::{Encoder, Registry, TextEncoder};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::ExporterMetrics;
use crate::qbit::{Torrent, TorrentSource, UpstreamError};
use crate::schema::{PeerKey, PeerTotals, TORRENT_SCHEMA};

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for a failed scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The torrent-list fetch failed; the scrape is abandoned and the
    /// registry keeps its previous values.
    #[error("upstream unavailable: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("encoded metrics were not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// The scrape aggregator. Owns the registry and all declared instruments;
/// tests instantiate one per case with an in-memory [`TorrentSource`].
pub struct Scraper<C> {
    client: C,
    registry: Registry,
    metrics: ExporterMetrics,
}

impl<C> Scraper<C>
where
    C: TorrentSource + Send + Sync,
{
    pub fn new(client: C, prefix: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = ExporterMetrics::new(&registry, prefix)?;
        Ok(Self {
            client,
            registry,
            metrics,
        })
    }

    /// Runs one full fetch/reset/populate/render cycle.
    pub async fn scrape(&self) -> Result<String, ScrapeError> {
        let start = Instant::now();

        let torrents = self.client.list_torrents().await?;
        debug!("fetched {} torrents", torrents.len());

        let peers = self.fetch_peer_totals(&torrents).await;

        // Registry updates start only now that every upstream call is done.
        for gauge in &self.metrics.torrent_gauges {
            gauge.reset();
        }
        for torrent in &torrents {
            let values = torrent_label_values(torrent);
            let labels: Vec<&str> = values.iter().map(String::as_str).collect();
            for (def, gauge) in TORRENT_SCHEMA.iter().zip(&self.metrics.torrent_gauges) {
                let mut value = (def.read)(torrent);
                if let Some(transform) = def.transform {
                    value = transform(value);
                }
                gauge.with_label_values(&labels).set(value);
            }
        }
        self.metrics.peers.store(&peers);

        self.metrics.torrents_total.set(torrents.len() as f64);
        self.metrics
            .scrape_duration
            .set(start.elapsed().as_secs_f64());

        self.render()
    }

    /// Fetches peer lists concurrently for every torrent with at least one
    /// connected seeder or leecher and folds them into per-identity totals.
    /// A failed peer fetch degrades that torrent's contribution only.
    async fn fetch_peer_totals(&self, torrents: &[Torrent]) -> BTreeMap<PeerKey, PeerTotals> {
        let active: Vec<&Torrent> = torrents
            .iter()
            .filter(|t| t.num_seeds + t.num_leechs > 0)
            .collect();

        let results = join_all(active.iter().map(|torrent| async move {
            (torrent.hash.as_str(), self.client.list_peers(&torrent.hash).await)
        }))
        .await;

        let mut totals: BTreeMap<PeerKey, PeerTotals> = BTreeMap::new();
        for (hash, result) in results {
            match result {
                Ok(observations) => {
                    for peer in &observations {
                        totals
                            .entry(PeerKey::for_peer(peer))
                            .or_default()
                            .accumulate(peer);
                    }
                }
                Err(e) => {
                    warn!("peer fetch for torrent {hash} failed, skipping its peers: {e}");
                }
            }
        }
        totals
    }

    /// Renders the current registry contents as exposition text.
    pub fn render(&self) -> Result<String, ScrapeError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::with_capacity(BUFFER_CAP);
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Label values for one torrent, in [`TORRENT_LABEL_NAMES`] order.
///
/// [`TORRENT_LABEL_NAMES`]: crate::schema::TORRENT_LABEL_NAMES
fn torrent_label_values(torrent: &Torrent) -> [String; 8] {
    [
        torrent.name.clone(),
        torrent.tracker.clone(),
        torrent.total_size.to_string(),
        torrent.added_on.to_string(),
        torrent.hash.clone(),
        torrent.category.clone(),
        torrent.tags.clone(),
        torrent.state.clone(),
    ]
}
