//! Prometheus metric instruments for qbit-exporter.
//!
//! Torrent-level metrics are plain `GaugeVec`s declared once at startup and
//! reset/repopulated on every scrape. Peer-level metrics go through a custom
//! [`Collector`] instead: the `client` label must be omitted entirely for
//! peers that did not report one, which a fixed-arity `GaugeVec` cannot
//! express. The collector holds the last completed scrape's samples and is
//! swapped wholesale, so a torrent or peer that disappeared upstream leaves
//! no stale series behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use prometheus::core::{Collector, Desc};
use prometheus::{proto, Gauge, GaugeVec, Opts, Registry};

use crate::schema::{
    PeerKey, PeerTotals, PEER_LABEL_NAMES, PEER_SCHEMA, TORRENT_LABEL_NAMES, TORRENT_SCHEMA,
};

/// All instruments registered by the exporter.
pub struct ExporterMetrics {
    /// One gauge family per torrent schema row, in schema order.
    pub torrent_gauges: Vec<GaugeVec>,
    pub peers: PeerMetrics,
    pub scrape_duration: Gauge,
    pub torrents_total: Gauge,
}

impl ExporterMetrics {
    /// Creates and registers every instrument. The registry rejects a second
    /// registration under the same metric names.
    pub fn new(registry: &Registry, prefix: &str) -> Result<Self, prometheus::Error> {
        let mut torrent_gauges = Vec::with_capacity(TORRENT_SCHEMA.len());
        for def in TORRENT_SCHEMA {
            let gauge = GaugeVec::new(
                Opts::new(format!("{prefix}{}", def.name), def.help),
                TORRENT_LABEL_NAMES,
            )?;
            registry.register(Box::new(gauge.clone()))?;
            torrent_gauges.push(gauge);
        }

        let peers = PeerMetrics::new(prefix)?;
        registry.register(Box::new(peers.clone()))?;

        let scrape_duration = Gauge::new(
            format!("{prefix}exporter_scrape_duration_seconds"),
            "Time spent fetching and aggregating upstream state for the last scrape",
        )?;
        let torrents_total = Gauge::new(
            format!("{prefix}exporter_torrents_total"),
            "Number of torrents exported by the last scrape",
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(torrents_total.clone()))?;

        Ok(Self {
            torrent_gauges,
            peers,
            scrape_duration,
            torrents_total,
        })
    }
}

/// Collector exposing the peer-level gauge families.
///
/// Each scrape builds the full sample set into a private buffer and swaps it
/// in with [`PeerMetrics::store`]; concurrent renders see either the old or
/// the new snapshot, never a half-populated one.
#[derive(Clone)]
pub struct PeerMetrics {
    names: Arc<Vec<String>>,
    descs: Arc<Vec<Desc>>,
    families: Arc<RwLock<Vec<proto::MetricFamily>>>,
}

impl PeerMetrics {
    pub fn new(prefix: &str) -> Result<Self, prometheus::Error> {
        let mut names = Vec::with_capacity(PEER_SCHEMA.len());
        let mut descs = Vec::with_capacity(PEER_SCHEMA.len());
        for def in PEER_SCHEMA {
            let name = format!("{prefix}{}", def.name);
            descs.push(Desc::new(
                name.clone(),
                def.help.to_string(),
                PEER_LABEL_NAMES.iter().map(|s| (*s).to_string()).collect(),
                HashMap::new(),
            )?);
            names.push(name);
        }
        Ok(Self {
            names: Arc::new(names),
            descs: Arc::new(descs),
            families: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Replaces the exported peer samples with the given aggregation result.
    ///
    /// The map is ordered by peer identity, so repeated scrapes against an
    /// unchanged upstream render identical output.
    pub fn store(&self, totals: &BTreeMap<PeerKey, PeerTotals>) {
        let mut families = Vec::with_capacity(PEER_SCHEMA.len());
        for (def, name) in PEER_SCHEMA.iter().zip(self.names.iter()) {
            let metrics: Vec<proto::Metric> = totals
                .iter()
                .map(|(key, peer_totals)| {
                    let mut metric = proto::Metric::new();
                    metric.set_label(label_pairs(key).into());
                    let mut gauge = proto::Gauge::new();
                    gauge.set_value((def.read)(peer_totals));
                    metric.set_gauge(gauge);
                    metric
                })
                .collect();

            let mut family = proto::MetricFamily::new();
            family.set_name(name.clone());
            family.set_help(def.help.to_string());
            family.set_field_type(proto::MetricType::GAUGE);
            family.set_metric(metrics.into());
            families.push(family);
        }
        let mut guard = self
            .families
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = families;
    }
}

impl Collector for PeerMetrics {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Builds the label pairs for one peer sample, alphabetically ordered to
/// match the text encoder's output for regular metric vecs. A peer without a
/// client identifier gets no `client` pair at all.
fn label_pairs(key: &PeerKey) -> Vec<proto::LabelPair> {
    let mut pairs = Vec::with_capacity(4);
    if let Some(client) = &key.client {
        pairs.push(label_pair("client", client));
    }
    pairs.push(label_pair("country", &key.country));
    pairs.push(label_pair("ip", &key.ip));
    pairs.push(label_pair("port", &key.port.to_string()));
    pairs
}

fn label_pair(name: &str, value: &str) -> proto::LabelPair {
    let mut pair = proto::LabelPair::new();
    pair.set_name(name.to_string());
    pair.set_value(value.to_string());
    pair
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_one_family_per_schema_row() {
        let registry = Registry::new();
        let metrics = ExporterMetrics::new(&registry, "qBit_").unwrap();
        assert_eq!(metrics.torrent_gauges.len(), TORRENT_SCHEMA.len());
        for gauge in &metrics.torrent_gauges {
            gauge
                .with_label_values(&["n", "t", "0", "0", "h", "c", "", "uploading"])
                .set(1.0);
        }
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"qBit_ratio".to_string()));
        assert!(names.contains(&"qBit_exporter_torrents_total".to_string()));
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let registry = Registry::new();
        ExporterMetrics::new(&registry, "qBit_").unwrap();
        assert!(ExporterMetrics::new(&registry, "qBit_").is_err());
    }

    #[test]
    fn empty_client_omits_the_label_pair() {
        let peers = PeerMetrics::new("qBit_").unwrap();
        let mut totals = BTreeMap::new();
        totals.insert(
            PeerKey {
                country: "US".into(),
                client: None,
                ip: "1.2.3.4".into(),
                port: 6881,
            },
            PeerTotals {
                downloaded: 500.0,
                ..PeerTotals::default()
            },
        );
        totals.insert(
            PeerKey {
                country: "DE".into(),
                client: Some("deluge".into()),
                ip: "5.6.7.8".into(),
                port: 51413,
            },
            PeerTotals::default(),
        );
        peers.store(&totals);

        let families = peers.collect();
        assert_eq!(families.len(), PEER_SCHEMA.len());
        for family in &families {
            assert_eq!(family.get_metric().len(), 2);
            for metric in family.get_metric() {
                let labels: Vec<&str> = metric.get_label().iter().map(|l| l.get_name()).collect();
                if labels.contains(&"client") {
                    assert_eq!(labels, vec!["client", "country", "ip", "port"]);
                } else {
                    assert_eq!(labels, vec!["country", "ip", "port"]);
                }
            }
        }

        let downloaded = families
            .iter()
            .find(|f| f.get_name() == "qBit_peer_dl_total_bytes")
            .unwrap();
        let anonymous = downloaded
            .get_metric()
            .iter()
            .find(|m| m.get_label().iter().any(|l| l.get_value() == "US"))
            .unwrap();
        assert_eq!(anonymous.get_gauge().value(), 500.0);
    }

    #[test]
    fn store_replaces_previous_samples() {
        let peers = PeerMetrics::new("qBit_").unwrap();
        let mut totals = BTreeMap::new();
        totals.insert(
            PeerKey {
                country: "US".into(),
                client: None,
                ip: "1.2.3.4".into(),
                port: 6881,
            },
            PeerTotals::default(),
        );
        peers.store(&totals);
        assert_eq!(peers.collect()[0].get_metric().len(), 1);

        peers.store(&BTreeMap::new());
        assert!(peers.collect()[0].get_metric().is_empty());
    }
}
