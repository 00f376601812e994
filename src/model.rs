use std::{
    cmp::Ordering,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

pub type EntryId = i64;

/// The currently focused view. Scopes keybindings and list commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewContext {
    Torrents,
    Peers,
    Trackers,
    Files,
}

impl ViewContext {
    pub const ALL: [ViewContext; 4] = [
        ViewContext::Torrents,
        ViewContext::Peers,
        ViewContext::Trackers,
        ViewContext::Files,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ViewContext::Torrents => "torrents",
            ViewContext::Peers => "peers",
            ViewContext::Trackers => "trackers",
            ViewContext::Files => "files",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "torrents" | "torrent" => Some(ViewContext::Torrents),
            "peers" | "peer" => Some(ViewContext::Peers),
            "trackers" | "tracker" => Some(ViewContext::Trackers),
            "files" | "file" => Some(ViewContext::Files),
            _ => None,
        }
    }
}

/// A typed field value as exposed to sorting and filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    /// Total ordering across values of the same shape; mixed shapes order
    /// Bool < Number < Text so a sort never panics on a heterogeneous field.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Text(a), FieldValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Bool(_), _) => Ordering::Less,
            (_, FieldValue::Bool(_)) => Ordering::Greater,
            (FieldValue::Number(_), FieldValue::Text(_)) => Ordering::Less,
            (FieldValue::Text(_), FieldValue::Number(_)) => Ordering::Greater,
        }
    }
}

/// Capability interface for anything the list model can hold. A type claiming
/// the capability implements the full method set; there is no runtime default
/// that fails on first use.
pub trait Entry {
    /// Field names accepted by sort and filter commands for this view.
    const FIELDS: &'static [&'static str];

    /// Stable identifier; survives snapshot refreshes.
    fn id(&self) -> EntryId;

    /// Typed value of a field, `None` for unknown names.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: String,
    pub download_speed: i64,
    pub upload_speed: i64,
    pub active_torrents: i64,
    pub paused_torrents: i64,
    pub total_torrents: i64,
    pub torrents: Vec<TorrentItem>,
}

#[derive(Debug, Clone)]
pub struct TorrentItem {
    pub torrent_id: i64,
    pub name: String,
    pub status: String,
    pub percent_done: f64,
    pub rate_download: i64,
    pub rate_upload: i64,
    pub eta: Option<i64>,
    pub upload_ratio: f64,
    pub size_when_done: i64,
    pub left_until_done: i64,
    pub download_dir: String,
    pub peers_connected: i64,
    pub error: Option<String>,
    pub peers: Vec<PeerItem>,
    pub trackers: Vec<TrackerItem>,
    pub files: Vec<FileItem>,
}

impl Entry for TorrentItem {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "status",
        "progress",
        "rate-down",
        "rate-up",
        "eta",
        "ratio",
        "size",
        "left",
        "peers-connected",
        "path",
    ];

    fn id(&self) -> EntryId {
        self.torrent_id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "id" => FieldValue::Number(self.torrent_id as f64),
            "name" => FieldValue::Text(self.name.clone()),
            "status" => FieldValue::Text(self.status.clone()),
            "progress" => FieldValue::Number(self.percent_done * 100.0),
            "rate-down" => FieldValue::Number(self.rate_download as f64),
            "rate-up" => FieldValue::Number(self.rate_upload as f64),
            "eta" => FieldValue::Number(self.eta.unwrap_or(i64::MAX) as f64),
            "ratio" => FieldValue::Number(self.upload_ratio),
            "size" => FieldValue::Number(self.size_when_done as f64),
            "left" => FieldValue::Number(self.left_until_done as f64),
            "peers-connected" => FieldValue::Number(self.peers_connected as f64),
            "path" => FieldValue::Text(self.download_dir.clone()),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct PeerItem {
    pub peer_id: EntryId,
    pub torrent_id: i64,
    pub torrent_name: String,
    pub address: String,
    pub client: String,
    pub progress: f64,
    pub rate_down: i64,
    pub rate_up: i64,
    /// Smoothed rates, filled in by the rate estimator on snapshot arrival.
    pub rate_down_smoothed: f64,
    pub rate_up_smoothed: f64,
}

impl PeerItem {
    /// Peers carry no identifier on the wire; derive a stable one from the
    /// torrent and the peer address.
    pub fn derive_id(torrent_id: i64, address: &str) -> EntryId {
        let mut hasher = DefaultHasher::new();
        torrent_id.hash(&mut hasher);
        address.hash(&mut hasher);
        hasher.finish() as EntryId
    }
}

impl Entry for PeerItem {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "torrent",
        "torrent-id",
        "address",
        "client",
        "progress",
        "rate-down",
        "rate-up",
    ];

    fn id(&self) -> EntryId {
        self.peer_id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "id" => FieldValue::Number(self.peer_id as f64),
            "torrent" => FieldValue::Text(self.torrent_name.clone()),
            "torrent-id" => FieldValue::Number(self.torrent_id as f64),
            "address" => FieldValue::Text(self.address.clone()),
            "client" => FieldValue::Text(self.client.clone()),
            "progress" => FieldValue::Number(self.progress * 100.0),
            "rate-down" => FieldValue::Number(self.rate_down_smoothed),
            "rate-up" => FieldValue::Number(self.rate_up_smoothed),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct TrackerItem {
    pub tracker_id: EntryId,
    pub torrent_id: i64,
    pub torrent_name: String,
    pub url: String,
    pub tier: i64,
    pub seeder_count: i64,
    pub leecher_count: i64,
}

impl Entry for TrackerItem {
    const FIELDS: &'static [&'static str] =
        &["id", "torrent", "torrent-id", "url", "tier", "seeds", "leeches"];

    fn id(&self) -> EntryId {
        self.tracker_id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "id" => FieldValue::Number(self.tracker_id as f64),
            "torrent" => FieldValue::Text(self.torrent_name.clone()),
            "torrent-id" => FieldValue::Number(self.torrent_id as f64),
            "url" => FieldValue::Text(self.url.clone()),
            "tier" => FieldValue::Number(self.tier as f64),
            "seeds" => FieldValue::Number(self.seeder_count as f64),
            "leeches" => FieldValue::Number(self.leecher_count as f64),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct FileItem {
    pub file_id: EntryId,
    pub torrent_id: i64,
    pub torrent_name: String,
    pub name: String,
    pub size_total: i64,
    pub size_downloaded: i64,
    pub wanted: bool,
    pub priority: i64,
}

impl FileItem {
    /// Files are indexed per torrent; pack both into one stable id.
    pub fn derive_id(torrent_id: i64, index: usize) -> EntryId {
        (torrent_id << 20) | index as i64
    }

    pub fn progress(&self) -> f64 {
        if self.size_total <= 0 {
            return 0.0;
        }
        self.size_downloaded as f64 / self.size_total as f64
    }
}

impl Entry for FileItem {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "torrent",
        "name",
        "size",
        "downloaded",
        "progress",
        "wanted",
        "priority",
    ];

    fn id(&self) -> EntryId {
        self.file_id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "id" => FieldValue::Number(self.file_id as f64),
            "torrent" => FieldValue::Text(self.torrent_name.clone()),
            "name" => FieldValue::Text(self.name.clone()),
            "size" => FieldValue::Number(self.size_total as f64),
            "downloaded" => FieldValue::Number(self.size_downloaded as f64),
            "progress" => FieldValue::Number(self.progress() * 100.0),
            "wanted" => FieldValue::Bool(self.wanted),
            "priority" => FieldValue::Number(self.priority as f64),
            _ => return None,
        };
        Some(value)
    }
}

pub fn format_speed(value: f64) -> String {
    const UNITS: [&str; 5] = ["B/s", "KiB/s", "MiB/s", "GiB/s", "TiB/s"];
    let mut magnitude = value.max(0.0);
    let mut unit = 0;
    while magnitude >= 1024.0 && unit < UNITS.len() - 1 {
        magnitude /= 1024.0;
        unit += 1;
    }
    format!("{:>4.1}{}", magnitude, UNITS[unit])
}

pub fn format_progress(value: f64) -> String {
    format!("{:5.1}%", value * 100.0)
}

pub fn format_eta(seconds: Option<i64>) -> String {
    match seconds {
        None => "∞".to_string(),
        Some(raw) if raw < 0 => "∞".to_string(),
        Some(raw) => {
            let duration = Duration::from_secs(raw as u64);
            let days = duration.as_secs() / 86_400;
            let hours = (duration.as_secs() % 86_400) / 3_600;
            let minutes = (duration.as_secs() % 3_600) / 60;
            let seconds = duration.as_secs() % 60;
            if days > 0 {
                format!("{}d{}h", days, hours)
            } else if hours > 0 {
                format!("{}h{}m", hours, minutes)
            } else if minutes > 0 {
                format!("{}m", minutes)
            } else {
                format!("{}s", seconds)
            }
        }
    }
}

pub fn format_bytes(value: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut magnitude = value.max(0) as f64;
    let mut unit = 0;
    while magnitude >= 1024.0 && unit < UNITS.len() - 1 {
        magnitude /= 1024.0;
        unit += 1;
    }
    format!("{:>4.1} {}", magnitude, UNITS[unit])
}

#[cfg(test)]
pub(crate) fn sample_torrent(id: i64, name: &str, size: i64) -> TorrentItem {
    TorrentItem {
        torrent_id: id,
        name: name.to_string(),
        status: "downloading".to_string(),
        percent_done: 0.5,
        rate_download: 1024,
        rate_upload: 256,
        eta: Some(120),
        upload_ratio: 0.1,
        size_when_done: size,
        left_until_done: size / 2,
        download_dir: "/downloads".to_string(),
        peers_connected: 4,
        error: None,
        peers: Vec::new(),
        trackers: Vec::new(),
        files: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup_matches_declared_fields() {
        let torrent = sample_torrent(1, "debian.iso", 700 << 20);
        for name in TorrentItem::FIELDS {
            assert!(torrent.field(name).is_some(), "missing field {name}");
        }
        assert!(torrent.field("no-such-field").is_none());
    }

    #[test]
    fn field_values_order_within_shape() {
        let a = FieldValue::Text("alpha".into());
        let b = FieldValue::Text("Beta".into());
        assert_eq!(a.compare(&b), Ordering::Less);
        let x = FieldValue::Number(2.0);
        let y = FieldValue::Number(10.0);
        assert_eq!(x.compare(&y), Ordering::Less);
    }

    #[test]
    fn peer_ids_are_stable_per_torrent_and_address() {
        let a = PeerItem::derive_id(1, "10.0.0.1:51413");
        let b = PeerItem::derive_id(1, "10.0.0.1:51413");
        let c = PeerItem::derive_id(2, "10.0.0.1:51413");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn eta_formatting() {
        assert_eq!(format_eta(None), "∞");
        assert_eq!(format_eta(Some(-1)), "∞");
        assert_eq!(format_eta(Some(59)), "59s");
        assert_eq!(format_eta(Some(3700)), "1h1m");
        assert_eq!(format_eta(Some(90_000)), "1d1h");
    }
}
