use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use anyhow::Result;
use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    config::RpcConfig,
    model::{FileItem, PeerItem, Snapshot, TorrentItem, TrackerItem},
};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed")]
    Authentication,
    #[error("session negotiation failed")]
    Session,
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type RpcResult<T> = std::result::Result<T, DaemonError>;

pub struct DaemonClient {
    http: Client,
    endpoint: String,
    auth: Option<(String, Option<String>)>,
    session_id: Mutex<Option<String>>,
    counter: AtomicU64,
}

impl DaemonClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        let RpcConfig {
            username,
            password,
            timeout,
            verify_ssl,
            user_agent,
            ..
        } = config;
        let mut builder = Client::builder().timeout(timeout).user_agent(user_agent);
        if !verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;
        let auth = username.map(|user| (user, password));
        Ok(Self {
            http,
            endpoint,
            auth,
            session_id: Mutex::new(None),
            counter: AtomicU64::new(1),
        })
    }

    pub fn fetch_snapshot(&self) -> RpcResult<Snapshot> {
        let fields = [
            "id",
            "name",
            "status",
            "percentDone",
            "rateDownload",
            "rateUpload",
            "eta",
            "uploadRatio",
            "sizeWhenDone",
            "leftUntilDone",
            "downloadDir",
            "peersConnected",
            "errorString",
            "peers",
            "trackerStats",
            "files",
            "priorities",
            "wanted",
        ];
        let torrents: TorrentGetResponse = self.torrent_get(&fields)?;
        let stats: SessionStats = self.session_stats()?;
        let session: SessionInfo = self.session_get(&["version"])?;
        Ok(Snapshot {
            version: session.version.unwrap_or_else(|| "unknown".to_string()),
            download_speed: stats.download_speed,
            upload_speed: stats.upload_speed,
            active_torrents: stats.active_torrent_count,
            paused_torrents: stats.paused_torrent_count,
            total_torrents: stats.torrent_count,
            torrents: torrents
                .torrents
                .into_iter()
                .map(TorrentItem::from)
                .collect(),
        })
    }

    pub fn add_magnet(&self, magnet: &str) -> RpcResult<AddTorrentOutcome> {
        let args = json!({
            "filename": magnet,
        });
        let response: AddTorrentResponse = self.call("torrent-add", Some(args))?;
        Ok(AddTorrentOutcome::from(response))
    }

    pub fn remove_torrents(&self, ids: &[i64], delete_local_data: bool) -> RpcResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let args = json!({
            "ids": ids,
            "delete-local-data": delete_local_data,
        });
        self.call_raw("torrent-remove", Some(args))?;
        Ok(())
    }

    pub fn start_torrents(&self, ids: &[i64]) -> RpcResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let args = json!({ "ids": ids });
        self.call_raw("torrent-start", Some(args))?;
        Ok(())
    }

    pub fn stop_torrents(&self, ids: &[i64]) -> RpcResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let args = json!({ "ids": ids });
        self.call_raw("torrent-stop", Some(args))?;
        Ok(())
    }

    /// Asks the daemon to re-announce torrents to their trackers now.
    pub fn reannounce_torrents(&self, ids: &[i64]) -> RpcResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let args = json!({ "ids": ids });
        self.call_raw("torrent-reannounce", Some(args))?;
        Ok(())
    }

    /// Sets the download priority of files (by index) within one torrent.
    pub fn set_file_priority(
        &self,
        torrent_id: i64,
        indices: &[i64],
        priority: i64,
    ) -> RpcResult<()> {
        if indices.is_empty() {
            return Ok(());
        }
        let key = match priority {
            p if p < 0 => "priority-low",
            0 => "priority-normal",
            _ => "priority-high",
        };
        let args = json!({
            "ids": [torrent_id],
            key: indices,
        });
        self.call_raw("torrent-set", Some(args))?;
        Ok(())
    }

    fn session_get<T>(&self, fields: &[&str]) -> RpcResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let args = if fields.is_empty() {
            None
        } else {
            Some(json!({"fields": fields}))
        };
        let value = self.call_raw("session-get", args)?;
        serde_json::from_value(value).map_err(DaemonError::from)
    }

    fn session_stats(&self) -> RpcResult<SessionStats> {
        let value = self.call_raw("session-stats", None)?;
        serde_json::from_value(value).map_err(DaemonError::from)
    }

    fn torrent_get(&self, fields: &[&str]) -> RpcResult<TorrentGetResponse> {
        let args = json!({"fields": fields});
        let value = self.call_raw("torrent-get", Some(args))?;
        serde_json::from_value(value).map_err(DaemonError::from)
    }

    fn call<T>(&self, method: &str, arguments: Option<Value>) -> RpcResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self.call_raw(method, arguments)?;
        serde_json::from_value(value).map_err(DaemonError::from)
    }

    fn call_raw(&self, method: &str, arguments: Option<Value>) -> RpcResult<Value> {
        let payload = RpcRequest {
            method,
            arguments,
            tag: self.counter.fetch_add(1, Ordering::Relaxed),
        };
        loop {
            let mut request = self
                .http
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .json(&payload);
            if let Some((user, pass)) = &self.auth {
                request = request.basic_auth(user, pass.as_ref());
            }
            let session_header = match self.session_id.lock() {
                Ok(guard) => (*guard).clone(),
                Err(_) => None,
            };
            if let Some(session) = session_header {
                request = request.header("X-Transmission-Session-Id", session);
            }
            let response = request.send()?;
            match response.status() {
                StatusCode::CONFLICT => {
                    if let Some(id) = response.headers().get("X-Transmission-Session-Id") {
                        let value = id
                            .to_str()
                            .map_err(|_| DaemonError::Session)?
                            .to_string();
                        if let Ok(mut guard) = self.session_id.lock() {
                            *guard = Some(value);
                        }
                        continue;
                    }
                    return Err(DaemonError::Session);
                }
                StatusCode::UNAUTHORIZED => return Err(DaemonError::Authentication),
                status if !status.is_success() => {
                    return Err(DaemonError::HttpStatus(status));
                }
                _ => {
                    let body: RpcResponse = response.json()?;
                    if body.result != "success" {
                        return Err(DaemonError::Rpc(body.result));
                    }
                    return Ok(body.arguments.unwrap_or(Value::Null));
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Value>,
    tag: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    arguments: Option<Value>,
    result: String,
}

#[derive(Debug, Deserialize)]
struct SessionStats {
    #[serde(default, alias = "activeTorrentCount")]
    active_torrent_count: i64,
    #[serde(default, alias = "pausedTorrentCount")]
    paused_torrent_count: i64,
    #[serde(default, alias = "torrentCount")]
    torrent_count: i64,
    #[serde(default, alias = "downloadSpeed")]
    download_speed: i64,
    #[serde(default, alias = "uploadSpeed")]
    upload_speed: i64,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TorrentGetResponse {
    #[serde(default)]
    torrents: Vec<TorrentWire>,
}

#[derive(Debug, Deserialize)]
struct TorrentWire {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: i64,
    #[serde(default, alias = "percentDone")]
    percent_done: f64,
    #[serde(default, alias = "rateDownload")]
    rate_download: i64,
    #[serde(default, alias = "rateUpload")]
    rate_upload: i64,
    #[serde(default)]
    eta: i64,
    #[serde(default, alias = "uploadRatio")]
    upload_ratio: f64,
    #[serde(default, alias = "sizeWhenDone")]
    size_when_done: i64,
    #[serde(default, alias = "leftUntilDone")]
    left_until_done: i64,
    #[serde(default, alias = "downloadDir")]
    download_dir: String,
    #[serde(default, alias = "peersConnected")]
    peers_connected: i64,
    #[serde(default, alias = "errorString")]
    error_string: String,
    #[serde(default)]
    peers: Vec<PeerWire>,
    #[serde(default, alias = "trackerStats")]
    tracker_stats: Vec<TrackerWire>,
    #[serde(default)]
    files: Vec<FileWire>,
    #[serde(default)]
    priorities: Vec<i64>,
    #[serde(default)]
    wanted: Vec<WantedFlag>,
}

/// Some daemon versions send wanted flags as 0/1, others as booleans.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WantedFlag {
    Bool(bool),
    Int(i64),
}

impl WantedFlag {
    fn as_bool(&self) -> bool {
        match self {
            WantedFlag::Bool(b) => *b,
            WantedFlag::Int(i) => *i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeerWire {
    #[serde(default)]
    address: String,
    #[serde(default, alias = "clientName")]
    client_name: String,
    #[serde(default)]
    progress: f64,
    #[serde(default, alias = "rateToClient")]
    rate_to_client: i64,
    #[serde(default, alias = "rateToPeer")]
    rate_to_peer: i64,
}

#[derive(Debug, Deserialize)]
struct TrackerWire {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    announce: String,
    #[serde(default)]
    tier: i64,
    #[serde(default, alias = "seederCount")]
    seeder_count: i64,
    #[serde(default, alias = "leecherCount")]
    leecher_count: i64,
}

#[derive(Debug, Deserialize)]
struct FileWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    length: i64,
    #[serde(default, alias = "bytesCompleted")]
    bytes_completed: i64,
}

fn status_label(status: i64) -> String {
    match status {
        0 => "stopped".to_string(),
        1 => "check-wait".to_string(),
        2 => "checking".to_string(),
        3 => "download-wait".to_string(),
        4 => "downloading".to_string(),
        5 => "seed-wait".to_string(),
        6 => "seeding".to_string(),
        other => format!("status-{other}"),
    }
}

impl From<TorrentWire> for TorrentItem {
    fn from(wire: TorrentWire) -> Self {
        let eta = if wire.eta >= 0 { Some(wire.eta) } else { None };
        let peers = wire
            .peers
            .into_iter()
            .map(|p| PeerItem {
                peer_id: PeerItem::derive_id(wire.id, &p.address),
                torrent_id: wire.id,
                torrent_name: wire.name.clone(),
                address: p.address,
                client: p.client_name,
                progress: p.progress,
                rate_down: p.rate_to_client,
                rate_up: p.rate_to_peer,
                rate_down_smoothed: p.rate_to_client as f64,
                rate_up_smoothed: p.rate_to_peer as f64,
            })
            .collect();
        let trackers = wire
            .tracker_stats
            .into_iter()
            .map(|t| TrackerItem {
                // Tracker ids are unique per torrent only.
                tracker_id: (wire.id << 16) | t.id,
                torrent_id: wire.id,
                torrent_name: wire.name.clone(),
                url: t.announce,
                tier: t.tier,
                seeder_count: t.seeder_count,
                leecher_count: t.leecher_count,
            })
            .collect();
        let files = wire
            .files
            .into_iter()
            .enumerate()
            .map(|(index, f)| FileItem {
                file_id: FileItem::derive_id(wire.id, index),
                torrent_id: wire.id,
                torrent_name: wire.name.clone(),
                name: f.name,
                size_total: f.length,
                size_downloaded: f.bytes_completed,
                wanted: wire.wanted.get(index).map_or(true, WantedFlag::as_bool),
                priority: wire.priorities.get(index).copied().unwrap_or(0),
            })
            .collect();
        TorrentItem {
            torrent_id: wire.id,
            name: wire.name,
            status: status_label(wire.status),
            percent_done: wire.percent_done,
            rate_download: wire.rate_download,
            rate_upload: wire.rate_upload,
            eta,
            upload_ratio: wire.upload_ratio,
            size_when_done: wire.size_when_done,
            left_until_done: wire.left_until_done,
            download_dir: wire.download_dir,
            peers_connected: wire.peers_connected,
            error: if wire.error_string.is_empty() {
                None
            } else {
                Some(wire.error_string)
            },
            peers,
            trackers,
            files,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddTorrentResponse {
    #[serde(rename = "torrent-added", alias = "torrentAdded")]
    torrent_added: Option<TorrentRef>,
    #[serde(rename = "torrent-duplicate", alias = "torrentDuplicate")]
    torrent_duplicate: Option<TorrentRef>,
}

#[derive(Debug, Deserialize)]
struct TorrentRef {
    id: Option<i64>,
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddTorrentOutcome {
    pub torrent_id: Option<i64>,
    pub name: Option<String>,
    pub added: bool,
    pub duplicate: bool,
}

impl From<AddTorrentResponse> for AddTorrentOutcome {
    fn from(resp: AddTorrentResponse) -> Self {
        if let Some(added) = resp.torrent_added {
            AddTorrentOutcome {
                torrent_id: added.id,
                name: added.name,
                added: true,
                duplicate: false,
            }
        } else if let Some(dup) = resp.torrent_duplicate {
            AddTorrentOutcome {
                torrent_id: dup.id,
                name: dup.name,
                added: false,
                duplicate: true,
            }
        } else {
            AddTorrentOutcome {
                torrent_id: None,
                name: None,
                added: false,
                duplicate: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_wire_builds_nested_items() {
        let wire: TorrentWire = serde_json::from_value(json!({
            "id": 7,
            "name": "debian.iso",
            "status": 4,
            "percentDone": 0.25,
            "peers": [
                {"address": "10.0.0.1:51413", "clientName": "Deluge", "progress": 0.9,
                 "rateToClient": 2048, "rateToPeer": 0}
            ],
            "trackerStats": [
                {"id": 0, "announce": "http://tracker.example/announce", "tier": 0,
                 "seederCount": 12, "leecherCount": 3}
            ],
            "files": [
                {"name": "debian.iso", "length": 1000, "bytesCompleted": 250}
            ],
            "priorities": [1],
            "wanted": [1]
        }))
        .unwrap();
        let torrent = TorrentItem::from(wire);
        assert_eq!(torrent.status, "downloading");
        assert_eq!(torrent.peers.len(), 1);
        assert_eq!(torrent.peers[0].torrent_name, "debian.iso");
        assert_eq!(torrent.trackers[0].seeder_count, 12);
        assert_eq!(torrent.files[0].priority, 1);
        assert!(torrent.files[0].wanted);
        assert_eq!(torrent.files[0].file_id, FileItem::derive_id(7, 0));
    }

    #[test]
    fn missing_optional_arrays_default_empty() {
        let wire: TorrentWire =
            serde_json::from_value(json!({"id": 1, "name": "x", "status": 0})).unwrap();
        let torrent = TorrentItem::from(wire);
        assert_eq!(torrent.status, "stopped");
        assert!(torrent.peers.is_empty());
        assert!(torrent.files.is_empty());
    }
}
