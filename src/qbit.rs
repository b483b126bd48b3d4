//! qBittorrent WebUI API client.
//!
//! This module provides the upstream adapter the scrape aggregator pulls its
//! data from: the torrent list (`torrents/info`) and the connected peers of a
//! single torrent (`sync/torrentPeers`). Authentication uses the WebUI's
//! cookie session; credentials are passed through from the configuration.

use std::collections::HashMap;
use std::future::Future;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Error type for failed upstream queries.
///
/// Any variant fails the whole torrent-list fetch (and with it the scrape);
/// for per-torrent peer fetches the caller degrades instead.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to qBittorrent failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("qBittorrent rejected the configured credentials")]
    LoginRejected,

    #[error("unexpected status {0} from qBittorrent")]
    Status(StatusCode),
}

/// One torrent as reported by `GET /api/v2/torrents/info`.
///
/// Only the fields the metric schema reads are deserialized; everything else
/// in the payload is ignored. Fields missing from older qBittorrent versions
/// fall back to their zero values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Torrent {
    pub hash: String,
    pub name: String,
    pub tracker: String,
    pub total_size: i64,
    pub added_on: i64,
    pub category: String,
    pub tags: String,
    pub state: String,

    pub dlspeed: i64,
    pub upspeed: i64,
    pub num_complete: i64,
    pub num_incomplete: i64,
    pub num_seeds: i64,
    pub num_leechs: i64,
    pub ratio: f64,
    pub progress: f64,
    pub downloaded: i64,
    pub uploaded: i64,
    pub amount_left: i64,
    pub last_activity: i64,
    pub seeding_time: i64,
    pub eta: i64,
}

/// One connected peer as reported by `GET /api/v2/sync/torrentPeers`.
///
/// The `client` string is frequently empty for peers that have not completed
/// the extended handshake.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Peer {
    pub country: String,
    pub client: String,
    pub ip: String,
    pub port: u16,
    pub dl_speed: i64,
    pub up_speed: i64,
    pub downloaded: i64,
    pub uploaded: i64,
    pub progress: f64,
}

/// `sync/torrentPeers` wraps the peer map in an envelope keyed by "ip:port".
#[derive(Debug, Default, Deserialize)]
struct TorrentPeersResponse {
    #[serde(default)]
    peers: HashMap<String, Peer>,
}

/// The upstream surface the scrape aggregator consumes.
///
/// Implemented by [`QbitClient`] for production and by in-memory fakes in
/// tests, so the aggregator can be exercised without a running qBittorrent.
pub trait TorrentSource {
    /// Lists all torrents currently known to the client.
    fn list_torrents(&self) -> impl Future<Output = Result<Vec<Torrent>, UpstreamError>> + Send;

    /// Lists the peers currently connected for one torrent hash.
    fn list_peers(&self, hash: &str)
        -> impl Future<Output = Result<Vec<Peer>, UpstreamError>> + Send;
}

/// HTTP client for the qBittorrent WebUI API.
///
/// Holds a cookie store so the session established by `auth/login` is reused
/// across scrapes; a request answered with 403 triggers one re-login and one
/// retry before the error propagates.
pub struct QbitClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl QbitClient {
    /// Builds the client from the resolved configuration.
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, path)
    }

    /// Establishes a WebUI session. qBittorrent answers 200 with a body of
    /// literal `Ok.` on success and `Fails.` on bad credentials.
    async fn login(&self) -> Result<(), UpstreamError> {
        let response = self
            .http
            .post(self.endpoint("auth/login"))
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response)?;
        let body = response.text().await?;
        if body.trim() != "Ok." {
            return Err(UpstreamError::LoginRejected);
        }
        debug!("authenticated against qBittorrent WebUI");
        Ok(())
    }

    /// GET with one re-login retry on 403 (expired or missing session cookie).
    async fn get_authed(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, UpstreamError> {
        let response = self.http.get(&url).query(query).send().await?;
        if response.status() == StatusCode::FORBIDDEN {
            debug!("qBittorrent session expired, re-authenticating");
            self.login().await?;
            let retried = self.http.get(&url).query(query).send().await?;
            return check_status(retried);
        }
        check_status(response)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(UpstreamError::Status(response.status()))
    }
}

impl TorrentSource for QbitClient {
    async fn list_torrents(&self) -> Result<Vec<Torrent>, UpstreamError> {
        let response = self.get_authed(self.endpoint("torrents/info"), &[]).await?;
        Ok(response.json().await?)
    }

    async fn list_peers(&self, hash: &str) -> Result<Vec<Peer>, UpstreamError> {
        let response = self
            .get_authed(self.endpoint("sync/torrentPeers"), &[("hash", hash)])
            .await?;
        let parsed: TorrentPeersResponse = response.json().await?;
        Ok(parsed.peers.into_values().collect())
    }
}
