use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque peer identifier, stable for the peer's lifetime in a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Connection state reported by the transport for a remote peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    NotConnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::NotConnected => "not connected",
        };
        f.write_str(label)
    }
}

/// Whether a peer currently has a resource transfer in flight towards us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    #[default]
    Idle,
    Receiving,
}

#[derive(Debug, Default)]
struct ProgressCounters {
    completed_bytes: AtomicU64,
    total_bytes: AtomicU64,
}

/// Shared progress handle for one resource transfer.
///
/// The transport advances it while bytes arrive; the application reads it
/// from the peer snapshots it receives. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct TransferProgress {
    counters: Arc<ProgressCounters>,
}

/// Point-in-time copy of a [`TransferProgress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub completed_bytes: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    pub fn new(total_bytes: u64) -> Self {
        let progress = Self::default();
        progress.set_total_bytes(total_bytes);
        progress
    }

    pub fn set_total_bytes(&self, total_bytes: u64) {
        self.counters.total_bytes.store(total_bytes, Ordering::Release);
    }

    pub fn set_completed_bytes(&self, completed_bytes: u64) {
        self.counters
            .completed_bytes
            .store(completed_bytes, Ordering::Release);
    }

    pub fn advance(&self, bytes: u64) {
        self.counters
            .completed_bytes
            .fetch_add(bytes, Ordering::AcqRel);
    }

    pub fn completed_bytes(&self) -> u64 {
        self.counters.completed_bytes.load(Ordering::Acquire)
    }

    pub fn total_bytes(&self) -> u64 {
        self.counters.total_bytes.load(Ordering::Acquire)
    }

    /// Completed fraction in `0.0..=1.0`; zero when the total is unknown
    pub fn fraction(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 {
            0.0
        } else {
            (self.completed_bytes() as f64 / total as f64).min(1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        let total = self.total_bytes();
        total > 0 && self.completed_bytes() >= total
    }

    /// Whether two handles observe the same transfer
    pub fn same_transfer(&self, other: &TransferProgress) -> bool {
        Arc::ptr_eq(&self.counters, &other.counters)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed_bytes: self.completed_bytes(),
            total_bytes: self.total_bytes(),
        }
    }
}

impl Serialize for TransferProgress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TransferProgress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = ProgressSnapshot::deserialize(deserializer)?;
        let progress = TransferProgress::new(snapshot.total_bytes);
        progress.set_completed_bytes(snapshot.completed_bytes);
        Ok(progress)
    }
}

/// One remote peer known to this session.
///
/// The registry owns the authoritative item; everything handed out to the
/// application is a clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerItem {
    pub id: PeerId,
    pub display_name: String,
    /// Invisible peers are tracked internally but never surfaced
    pub visible: bool,
    pub connection_state: ConnectionState,
    pub transfer_state: TransferState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<TransferProgress>,
    pub last_updated: DateTime<Utc>,
}

impl PeerItem {
    pub fn new(id: impl Into<PeerId>, display_name: impl Into<String>, visible: bool) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            visible,
            connection_state: ConnectionState::Connecting,
            transfer_state: TransferState::Idle,
            progress: None,
            last_updated: Utc::now(),
        }
    }

    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.connection_state = state;
        self
    }

    pub fn update_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
        self.last_updated = Utc::now();
    }

    pub fn start_receiving(&mut self, progress: TransferProgress) {
        self.transfer_state = TransferState::Receiving;
        self.progress = Some(progress);
        self.last_updated = Utc::now();
    }

    pub fn done_receiving(&mut self) {
        self.transfer_state = TransferState::Idle;
        self.progress = None;
        self.last_updated = Utc::now();
    }

    pub fn is_receiving(&self) -> bool {
        self.transfer_state == TransferState::Receiving
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}
