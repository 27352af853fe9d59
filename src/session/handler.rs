use crate::action_info::ActionInfoCache;
use crate::config::ServiceConfig;
use crate::peer::{ConnectionState, PeerId, PeerItem, PeerRegistry, TransferProgress};
use crate::session::events::*;
use crate::session::transport::TransportDelegate;
use crate::session::types::SessionError;
use crate::storage::ResourceStore;
use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Turns transport events into registry/cache updates, file placements and
/// application events.
///
/// Events for one peer are applied and emitted in the order they arrive;
/// events for different peers run concurrently.
pub struct SessionEventHandler {
    registry: Arc<PeerRegistry>,
    action_info: Arc<ActionInfoCache>,
    store: Arc<ResourceStore>,
    events: Arc<EventBus>,
    sinks: Vec<Box<dyn EventSink>>,
    shutdown: CancellationToken,
}

impl SessionEventHandler {
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_components(
            Arc::new(PeerRegistry::new()),
            Arc::new(ActionInfoCache::new(config.action_info.cache_config())),
            Arc::new(config.storage.resource_store()),
        )
    }

    /// Build a handler around existing components, e.g. a registry the
    /// transport layer already populates.
    pub fn with_components(
        registry: Arc<PeerRegistry>,
        action_info: Arc<ActionInfoCache>,
        store: Arc<ResourceStore>,
    ) -> Self {
        Self {
            registry,
            action_info,
            store,
            events: Arc::new(EventBus::new()),
            sinks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn action_info(&self) -> &Arc<ActionInfoCache> {
        &self.action_info
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Subscribe to application events
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Add a sink that sees every event before subscribers do
    pub fn add_event_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Create storage areas and clear leftovers from an earlier run
    pub async fn prepare_storage(&self) -> std::io::Result<usize> {
        self.store.prepare().await
    }

    /// Cancel in-flight copies. Their resources are reported as failed.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutting down session event handler");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Apply a connection state change reported for `peer_id`.
    ///
    /// Visible peers are updated and announced. Invisible peers are dropped
    /// from the registry once disconnected and are never announced.
    pub async fn handle_peer_state_changed(
        &self,
        peer_id: &PeerId,
        display_name: &str,
        state: ConnectionState,
    ) -> Result<(), SessionError> {
        info!(peer = %peer_id, name = %display_name, %state, "Peer did change state");

        self.in_peer_lane(peer_id, async {
            let Some(item) = self.registry.get(peer_id) else {
                return Err(SessionError::UnknownPeer(peer_id.clone()));
            };

            if item.visible {
                if let Some(updated) = self.registry.update(peer_id, |item| item.update_state(state)) {
                    self.emit(SessionEvent::PeerDidChangeState { peer: updated });
                }
            } else if state == ConnectionState::NotConnected {
                self.registry.remove(peer_id);
                debug!(peer = %peer_id, "Removed invisible peer after disconnect");
            } else {
                self.registry.update(peer_id, |item| item.update_state(state));
            }
            Ok(())
        })
        .await
    }

    /// Cache the action info records carried by a metadata payload
    pub async fn handle_data_received(
        &self,
        peer_id: &PeerId,
        data: &[u8],
    ) -> Result<usize, SessionError> {
        self.in_peer_lane(peer_id, async {
            if !self.registry.contains(peer_id) {
                return Err(SessionError::UnknownPeer(peer_id.clone()));
            }

            let stored = self.action_info.put_payload(data)?;
            info!(
                peer = %peer_id,
                "Received action info for {} resources ({} cached)",
                stored,
                self.action_info.len()
            );
            Ok(stored)
        })
        .await
    }

    /// Mark the peer as receiving and attach the transfer's progress handle
    pub async fn handle_transfer_start(
        &self,
        peer_id: &PeerId,
        resource_name: &str,
        progress: TransferProgress,
    ) -> Result<(), SessionError> {
        info!(peer = %peer_id, resource = %resource_name, "Did start receiving resource");

        self.in_peer_lane(peer_id, async {
            let Some(peer) = self
                .registry
                .update(peer_id, |item| item.start_receiving(progress))
            else {
                return Err(SessionError::UnknownPeer(peer_id.clone()));
            };

            if self.action_info.touch(resource_name) {
                debug!(resource = %resource_name, "Action info kept alive for the transfer");
            }

            if peer.visible {
                self.emit(SessionEvent::DidStartReceivingResource {
                    peer,
                    resource_name: resource_name.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    /// Finish a transfer: return the peer to idle, claim any action info and
    /// place the resource in staging (with action info) or the archive.
    ///
    /// `source_path` is the transport's temporary file; it is copied, never
    /// moved. Returns the final destination on success.
    pub async fn handle_transfer_finish(
        &self,
        peer_id: &PeerId,
        resource_name: &str,
        source_path: Option<PathBuf>,
        error: Option<String>,
    ) -> Result<PathBuf, SessionError> {
        info!(
            peer = %peer_id,
            resource = %resource_name,
            source = ?source_path,
            error = ?error,
            "Did finish receiving resource"
        );

        self.in_peer_lane(peer_id, async {
            let peer = self.registry.update(peer_id, PeerItem::done_receiving);
            if peer.is_none() {
                debug!(peer = %peer_id, "Finished transfer from unregistered peer");
            }
            let peer = peer.filter(|peer| peer.visible);

            if let Some(reason) = error {
                warn!(resource = %resource_name, "Transfer failed in transport: {}", reason);
                return Err(SessionError::TransportFailed {
                    resource_name: resource_name.to_string(),
                    reason,
                });
            }

            let Some(source_path) = source_path else {
                warn!(resource = %resource_name, "Transfer finished without a source path, nothing to copy");
                return Err(SessionError::MissingSourcePath {
                    resource_name: resource_name.to_string(),
                });
            };

            let action_info = self.action_info.pop(resource_name);
            let placed = self
                .store
                .place(
                    &source_path,
                    resource_name,
                    action_info.as_ref(),
                    &self.shutdown,
                )
                .await;

            match placed {
                Ok(destination) => {
                    let destination_path = destination.into_path();
                    self.emit(SessionEvent::DidReceiveResource {
                        resource_name: resource_name.to_string(),
                        peer,
                        destination_path: Some(destination_path.clone()),
                        action_info,
                    });
                    Ok(destination_path)
                }
                Err(e) => {
                    error!(
                        resource = %resource_name,
                        source = %source_path.display(),
                        "Failed to place received resource: {}",
                        e
                    );
                    self.emit(SessionEvent::ResourceTransferFailed {
                        resource_name: resource_name.to_string(),
                        peer,
                        reason: e.to_string(),
                        action_info,
                    });
                    Err(e.into())
                }
            }
        })
        .await
    }

    /// Byte streams are not supported; the event is acknowledged and dropped
    pub async fn handle_byte_stream_opened(&self, peer_id: &PeerId, stream_name: &str) {
        debug!(peer = %peer_id, stream = %stream_name, "Ignoring unsupported byte stream");
    }

    async fn in_peer_lane<F: Future>(&self, peer_id: &PeerId, work: F) -> F::Output {
        let lane = self.registry.lock_peer(peer_id).await;
        let output = work.await;
        self.registry.release(lane);
        output
    }

    fn emit(&self, event: SessionEvent) {
        if !event.is_meaningful() {
            debug!("Suppressing event without peer or destination: {:?}", event);
            return;
        }
        for sink in &self.sinks {
            sink.emit(&event);
        }
        self.events.emit(&event);
    }
}

fn log_failure(operation: &str, peer_id: &PeerId, error: &SessionError) {
    match error {
        SessionError::UnknownPeer(_) => {
            warn!(peer = %peer_id, "{}: {}", operation, error)
        }
        SessionError::TransportFailed { .. } | SessionError::MissingSourcePath { .. } => {
            debug!(peer = %peer_id, "{}: {}", operation, error)
        }
        SessionError::Decode(_) | SessionError::Storage(_) => {
            error!(peer = %peer_id, "{}: {}", operation, error)
        }
    }
}

#[async_trait]
impl TransportDelegate for SessionEventHandler {
    async fn on_peer_state_changed(
        &self,
        peer_id: PeerId,
        display_name: String,
        state: ConnectionState,
    ) {
        if let Err(e) = self
            .handle_peer_state_changed(&peer_id, &display_name, state)
            .await
        {
            log_failure("Peer state change ignored", &peer_id, &e);
        }
    }

    async fn on_data_received(&self, peer_id: PeerId, data: Vec<u8>) {
        if let Err(e) = self.handle_data_received(&peer_id, &data).await {
            log_failure("Data payload ignored", &peer_id, &e);
        }
    }

    async fn on_transfer_start(
        &self,
        peer_id: PeerId,
        resource_name: String,
        progress: TransferProgress,
    ) {
        if let Err(e) = self
            .handle_transfer_start(&peer_id, &resource_name, progress)
            .await
        {
            log_failure("Transfer start ignored", &peer_id, &e);
        }
    }

    async fn on_transfer_finish(
        &self,
        peer_id: PeerId,
        resource_name: String,
        source_path: Option<PathBuf>,
        error: Option<String>,
    ) {
        if let Err(e) = self
            .handle_transfer_finish(&peer_id, &resource_name, source_path, error)
            .await
        {
            log_failure("Transfer not delivered", &peer_id, &e);
        }
    }

    async fn on_byte_stream_opened(&self, peer_id: PeerId, stream_name: String) {
        self.handle_byte_stream_opened(&peer_id, &stream_name).await;
    }
}
