//! Static metric schema mapping upstream torrent fields onto exported gauges.
//!
//! The schema is a fixed table built once at startup: each row names the
//! exported metric, its help text, a typed accessor into the upstream
//! [`Torrent`] snapshot, and an optional unit conversion applied before
//! export. Typed accessors instead of string field lookups mean a malformed
//! row cannot exist past compilation.

use crate::qbit::{Peer, Torrent};

/// Label names attached to every torrent-level metric.
pub const TORRENT_LABEL_NAMES: &[&str] = &[
    "name",
    "tracker",
    "total_size",
    "added_on",
    "hash",
    "category",
    "tags",
    "state",
];

/// Label names attached to peer-level metrics. `client` is omitted from a
/// sample entirely when the peer did not report one.
pub const PEER_LABEL_NAMES: &[&str] = &["country", "client", "ip", "port"];

/// Unit conversion for fields qBittorrent reports in seconds.
fn seconds_to_millis(value: f64) -> f64 {
    value * 1000.0
}

/// One row of the torrent metric schema.
pub struct TorrentMetricDef {
    /// Exported metric name, qualified with the configured prefix at startup.
    pub name: &'static str,
    pub help: &'static str,
    /// Reads the raw value off a torrent snapshot.
    pub read: fn(&Torrent) -> f64,
    /// Pure numeric conversion applied to the raw value before export.
    pub transform: Option<fn(f64) -> f64>,
}

/// The canonical torrent schema. Counts and byte totals pass through
/// unrounded; time fields are converted from seconds to milliseconds.
pub const TORRENT_SCHEMA: &[TorrentMetricDef] = &[
    // Speed
    TorrentMetricDef {
        name: "dl_speed_bytes",
        help: "Download speed (bytes/s)",
        read: |t| t.dlspeed as f64,
        transform: None,
    },
    TorrentMetricDef {
        name: "up_speed_bytes",
        help: "Upload speed (bytes/s)",
        read: |t| t.upspeed as f64,
        transform: None,
    },
    // Seeds/Leeches
    TorrentMetricDef {
        name: "seeders_total",
        help: "Number of seeds in the swarm",
        read: |t| t.num_complete as f64,
        transform: None,
    },
    TorrentMetricDef {
        name: "leechers_total",
        help: "Number of leechers in the swarm",
        read: |t| t.num_incomplete as f64,
        transform: None,
    },
    TorrentMetricDef {
        name: "seeders_connected",
        help: "Number of seeds connected to",
        read: |t| t.num_seeds as f64,
        transform: None,
    },
    TorrentMetricDef {
        name: "leechers_connected",
        help: "Number of leechers connected to",
        read: |t| t.num_leechs as f64,
        transform: None,
    },
    // General
    TorrentMetricDef {
        name: "ratio",
        help: "Share ratio",
        read: |t| t.ratio,
        transform: None,
    },
    TorrentMetricDef {
        name: "percent_complete",
        help: "Torrent progress (percentage/100)",
        read: |t| t.progress,
        transform: None,
    },
    // Bytes
    TorrentMetricDef {
        name: "dl_total_bytes",
        help: "Downloaded bytes",
        read: |t| t.downloaded as f64,
        transform: None,
    },
    TorrentMetricDef {
        name: "up_total_bytes",
        help: "Uploaded bytes",
        read: |t| t.uploaded as f64,
        transform: None,
    },
    TorrentMetricDef {
        name: "bytes_left",
        help: "Bytes left to download",
        read: |t| t.amount_left as f64,
        transform: None,
    },
    // Times
    TorrentMetricDef {
        name: "last_activity",
        help: "Last time a chunk was downloaded/uploaded",
        read: |t| t.last_activity as f64,
        transform: Some(seconds_to_millis),
    },
    TorrentMetricDef {
        name: "seeding_time",
        help: "Total seeding time",
        read: |t| t.seeding_time as f64,
        transform: Some(seconds_to_millis),
    },
    TorrentMetricDef {
        name: "eta",
        help: "Torrent ETA (seconds)",
        read: |t| t.eta as f64,
        transform: Some(seconds_to_millis),
    },
];

/// Label identity of one remote peer within a scrape.
///
/// The torrent hash is deliberately not part of the key: the same peer seen
/// on several torrents collapses onto one series and its values accumulate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeerKey {
    pub country: String,
    /// Absent rather than empty, so the rendered sample carries no `client`
    /// label at all for peers that did not report one.
    pub client: Option<String>,
    pub ip: String,
    pub port: u16,
}

impl PeerKey {
    pub fn for_peer(peer: &Peer) -> Self {
        Self {
            country: peer.country.clone(),
            client: (!peer.client.is_empty()).then(|| peer.client.clone()),
            ip: peer.ip.clone(),
            port: peer.port,
        }
    }
}

/// Accumulated values for one peer identity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeerTotals {
    pub dl_speed: f64,
    pub up_speed: f64,
    pub downloaded: f64,
    pub uploaded: f64,
    pub progress: f64,
}

impl PeerTotals {
    /// Adds one observation. Increment rather than overwrite: a peer identity
    /// can show up under several torrents within a single scrape.
    pub fn accumulate(&mut self, peer: &Peer) {
        self.dl_speed += peer.dl_speed as f64;
        self.up_speed += peer.up_speed as f64;
        self.downloaded += peer.downloaded as f64;
        self.uploaded += peer.uploaded as f64;
        self.progress += peer.progress;
    }
}

/// One row of the peer metric schema, reading off the accumulated totals.
pub struct PeerMetricDef {
    pub name: &'static str,
    pub help: &'static str,
    pub read: fn(&PeerTotals) -> f64,
}

pub const PEER_SCHEMA: &[PeerMetricDef] = &[
    PeerMetricDef {
        name: "peer_dl_speed_bytes",
        help: "Peer download speed (bytes/s)",
        read: |p| p.dl_speed,
    },
    PeerMetricDef {
        name: "peer_up_speed_bytes",
        help: "Peer upload speed (bytes/s)",
        read: |p| p.up_speed,
    },
    PeerMetricDef {
        name: "peer_dl_total_bytes",
        help: "Bytes downloaded from peer",
        read: |p| p.downloaded,
    },
    PeerMetricDef {
        name: "peer_up_total_bytes",
        help: "Bytes uploaded to peer",
        read: |p| p.uploaded,
    },
    PeerMetricDef {
        name: "peer_percent_complete",
        help: "Peer progress (percentage/100)",
        read: |p| p.progress,
    },
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn schema_names_are_unique() {
        let mut seen = HashSet::new();
        for def in TORRENT_SCHEMA {
            assert!(seen.insert(def.name), "duplicate torrent metric {}", def.name);
        }
        for def in PEER_SCHEMA {
            assert!(seen.insert(def.name), "duplicate peer metric {}", def.name);
        }
    }

    #[test]
    fn time_fields_convert_seconds_to_millis() {
        let torrent = Torrent {
            last_activity: 100,
            ..Torrent::default()
        };
        let def = TORRENT_SCHEMA
            .iter()
            .find(|d| d.name == "last_activity")
            .unwrap();
        let raw = (def.read)(&torrent);
        let transform = def.transform.unwrap();
        assert_eq!(transform(raw), 100_000.0);
    }

    #[test]
    fn counts_and_ratios_pass_through_unrounded() {
        let torrent = Torrent {
            ratio: 1.55,
            num_seeds: 3,
            ..Torrent::default()
        };
        let ratio = TORRENT_SCHEMA.iter().find(|d| d.name == "ratio").unwrap();
        assert!(ratio.transform.is_none());
        assert_eq!((ratio.read)(&torrent), 1.55);

        let seeds = TORRENT_SCHEMA
            .iter()
            .find(|d| d.name == "seeders_connected")
            .unwrap();
        assert_eq!((seeds.read)(&torrent), 3.0);
    }

    #[test]
    fn peer_key_drops_empty_client() {
        let anonymous = Peer {
            country: "US".into(),
            ip: "1.2.3.4".into(),
            port: 6881,
            ..Peer::default()
        };
        assert_eq!(PeerKey::for_peer(&anonymous).client, None);

        let identified = Peer {
            client: "qBittorrent/5.0".into(),
            ..anonymous
        };
        assert_eq!(
            PeerKey::for_peer(&identified).client.as_deref(),
            Some("qBittorrent/5.0")
        );
    }

    #[test]
    fn peer_totals_accumulate_every_field() {
        let mut totals = PeerTotals::default();
        let peer = Peer {
            dl_speed: 10,
            up_speed: 20,
            downloaded: 500,
            uploaded: 700,
            progress: 0.5,
            ..Peer::default()
        };
        totals.accumulate(&peer);
        totals.accumulate(&peer);
        assert_eq!(totals.dl_speed, 20.0);
        assert_eq!(totals.up_speed, 40.0);
        assert_eq!(totals.downloaded, 1000.0);
        assert_eq!(totals.uploaded, 1400.0);
        assert_eq!(totals.progress, 1.0);
    }
}
