use crate::peer::types::*;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Registry of peers known to the session.
///
/// Peers are inserted on first sight by the transport layer; the session
/// handler only looks them up, mutates them and removes invisible ones.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: DashMap<PeerId, PeerItem>,
    lanes: DashMap<PeerId, Arc<Mutex<()>>>,
}

/// Exclusive ordering lane for one peer, released on drop
#[derive(Debug)]
pub struct PeerLane {
    peer_id: PeerId,
    _guard: OwnedMutexGuard<()>,
}

impl PeerLane {
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer, replacing any previous item with the same id
    pub fn insert(&self, item: PeerItem) -> Option<PeerItem> {
        debug!(peer = %item.id, name = %item.display_name, visible = item.visible, "Registering peer");
        self.peers.insert(item.id.clone(), item)
    }

    /// Snapshot of a peer, if registered
    pub fn get(&self, peer_id: &PeerId) -> Option<PeerItem> {
        self.peers.get(peer_id).map(|item| item.clone())
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    /// Remove a peer. Removing an unknown peer is a no-op.
    pub fn remove(&self, peer_id: &PeerId) -> Option<PeerItem> {
        let removed = self.peers.remove(peer_id).map(|(_, item)| item);
        if removed.is_some() {
            debug!(peer = %peer_id, "Removed peer from registry");
        }
        removed
    }

    /// Apply `mutation` to a registered peer and return the updated snapshot.
    /// Returns `None` without calling `mutation` when the peer is unknown.
    pub fn update<F>(&self, peer_id: &PeerId, mutation: F) -> Option<PeerItem>
    where
        F: FnOnce(&mut PeerItem),
    {
        self.peers.get_mut(peer_id).map(|mut item| {
            mutation(&mut item);
            item.clone()
        })
    }

    /// Wait for exclusive access to a peer's ordering lane.
    ///
    /// Lanes are fair, so events for the same peer are processed in the order
    /// they asked for the lane. Different peers never contend.
    pub async fn lock_peer(&self, peer_id: &PeerId) -> PeerLane {
        let lane = self
            .lanes
            .entry(peer_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        PeerLane {
            peer_id: peer_id.clone(),
            _guard: lane.lock_owned().await,
        }
    }

    /// Release a lane. The lane itself is dropped once its peer is gone and
    /// no other event is queued on it.
    pub fn release(&self, lane: PeerLane) {
        let PeerLane {
            peer_id,
            _guard: guard,
        } = lane;
        drop(guard);

        if !self.peers.contains_key(&peer_id) {
            self.lanes
                .remove_if(&peer_id, |_, lane| Arc::strong_count(lane) == 1);
        }
    }

    /// Number of peers with a live ordering lane
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Snapshots of every registered peer, sorted by id
    pub fn peers(&self) -> Vec<PeerItem> {
        let mut peers: Vec<PeerItem> = self.peers.iter().map(|entry| entry.clone()).collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }

    /// Snapshots of peers the application is allowed to see
    pub fn visible_peers(&self) -> Vec<PeerItem> {
        self.peers()
            .into_iter()
            .filter(|item| item.visible)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
