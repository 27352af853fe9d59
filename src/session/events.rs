use crate::action_info::ActionInfo;
use crate::peer::{PeerId, PeerItem};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Identifier of one event subscription
pub type SubscriptionId = uuid::Uuid;

/// Events surfaced to the application
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A visible peer changed connection state
    PeerDidChangeState { peer: PeerItem },

    /// A visible peer started sending us a resource
    DidStartReceivingResource {
        peer: PeerItem,
        resource_name: String,
    },

    /// A resource was received and placed on disk
    DidReceiveResource {
        resource_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        peer: Option<PeerItem>,
        #[serde(skip_serializing_if = "Option::is_none")]
        destination_path: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_info: Option<ActionInfo>,
    },

    /// A resource arrived but could not be placed on disk
    ResourceTransferFailed {
        resource_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        peer: Option<PeerItem>,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_info: Option<ActionInfo>,
    },
}

impl SessionEvent {
    /// Peer the event is about, if it carries one
    pub fn peer_id(&self) -> Option<&PeerId> {
        match self {
            Self::PeerDidChangeState { peer } | Self::DidStartReceivingResource { peer, .. } => {
                Some(&peer.id)
            }
            Self::DidReceiveResource { peer, .. } | Self::ResourceTransferFailed { peer, .. } => {
                peer.as_ref().map(|peer| &peer.id)
            }
        }
    }

    pub fn resource_name(&self) -> Option<&str> {
        match self {
            Self::PeerDidChangeState { .. } => None,
            Self::DidStartReceivingResource { resource_name, .. }
            | Self::DidReceiveResource { resource_name, .. }
            | Self::ResourceTransferFailed { resource_name, .. } => Some(resource_name),
        }
    }

    /// A received-resource event carrying neither a peer nor a path tells the
    /// application nothing and is never delivered.
    pub fn is_meaningful(&self) -> bool {
        match self {
            Self::DidReceiveResource {
                peer,
                destination_path,
                ..
            } => peer.is_some() || destination_path.is_some(),
            _ => true,
        }
    }
}

/// Receiver of application events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SessionEvent);
}

/// Live subscription to a session's event stream
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, or `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }

    /// Every event queued right now
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Typed event channel owned by a session.
///
/// Each subscriber sees events in exactly the order they were emitted.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<(SubscriptionId, mpsc::UnboundedSender<SessionEvent>)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId::new_v4();
        self.lock_subscribers().push((id, sender));
        debug!(subscription = %id, "Event subscriber added");
        Subscription { id, receiver }
    }

    /// Stop delivering to a subscription. Returns false if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(subscriber_id, _)| *subscriber_id != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!(subscription = %id, "Event subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn lock_subscribers(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, mpsc::UnboundedSender<SessionEvent>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: &SessionEvent) {
        // The lock is held across delivery so concurrent emitters cannot
        // interleave differently for different subscribers.
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|(id, sender)| {
            let delivered = sender.send(event.clone()).is_ok();
            if !delivered {
                debug!(subscription = %id, "Dropping closed event subscriber");
            }
            delivered
        });
    }
}

/// Sink that writes every event to the log
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &SessionEvent) {
        match event {
            SessionEvent::PeerDidChangeState { peer } => {
                info!(
                    "Peer {} ({}) is now {}",
                    peer.display_name, peer.id, peer.connection_state
                );
            }
            SessionEvent::DidStartReceivingResource {
                peer,
                resource_name,
            } => {
                info!("Receiving {} from {}", resource_name, peer.display_name);
            }
            SessionEvent::DidReceiveResource {
                resource_name,
                destination_path,
                action_info,
                ..
            } => {
                info!(
                    "Received {} at {:?} (action info: {})",
                    resource_name,
                    destination_path,
                    action_info.is_some()
                );
            }
            SessionEvent::ResourceTransferFailed {
                resource_name,
                reason,
                ..
            } => {
                warn!("Failed to receive {}: {}", resource_name, reason);
            }
        }
    }
}
