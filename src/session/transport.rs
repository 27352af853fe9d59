//! Contract between the connectivity transport and the session layer.
//!
//! The transport owns connection establishment, discovery and encryption. It
//! reports what happens on the session through [`TransportDelegate`], one
//! callback per kind of event, possibly from many tasks at once.

use crate::peer::{ConnectionState, PeerId, TransferProgress};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One inbound event from the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    PeerStateChanged {
        peer_id: PeerId,
        display_name: String,
        state: ConnectionState,
    },
    /// Arbitrary bytes; expected to hold an action info payload
    DataReceived { peer_id: PeerId, data: Vec<u8> },
    TransferStarted {
        peer_id: PeerId,
        resource_name: String,
        #[serde(default)]
        progress: TransferProgress,
    },
    /// `source_path` is the transport's temporary copy of the resource
    TransferFinished {
        peer_id: PeerId,
        resource_name: String,
        #[serde(default)]
        source_path: Option<PathBuf>,
        #[serde(default)]
        error: Option<String>,
    },
    /// Raw byte streams are reserved and never processed
    ByteStreamOpened { peer_id: PeerId, stream_name: String },
}

impl TransportEvent {
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::PeerStateChanged { peer_id, .. }
            | Self::DataReceived { peer_id, .. }
            | Self::TransferStarted { peer_id, .. }
            | Self::TransferFinished { peer_id, .. }
            | Self::ByteStreamOpened { peer_id, .. } => peer_id,
        }
    }
}

/// Callbacks the transport invokes on the session layer.
///
/// Implementations must never fail the caller: a bad event is logged and
/// dropped so the transport's event loop keeps running.
#[async_trait]
pub trait TransportDelegate: Send + Sync {
    async fn on_peer_state_changed(
        &self,
        peer_id: PeerId,
        display_name: String,
        state: ConnectionState,
    );

    async fn on_data_received(&self, peer_id: PeerId, data: Vec<u8>);

    async fn on_transfer_start(
        &self,
        peer_id: PeerId,
        resource_name: String,
        progress: TransferProgress,
    );

    async fn on_transfer_finish(
        &self,
        peer_id: PeerId,
        resource_name: String,
        source_path: Option<PathBuf>,
        error: Option<String>,
    );

    async fn on_byte_stream_opened(&self, peer_id: PeerId, stream_name: String);

    /// Route an event to the matching callback
    async fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::PeerStateChanged {
                peer_id,
                display_name,
                state,
            } => self.on_peer_state_changed(peer_id, display_name, state).await,
            TransportEvent::DataReceived { peer_id, data } => {
                self.on_data_received(peer_id, data).await
            }
            TransportEvent::TransferStarted {
                peer_id,
                resource_name,
                progress,
            } => self.on_transfer_start(peer_id, resource_name, progress).await,
            TransportEvent::TransferFinished {
                peer_id,
                resource_name,
                source_path,
                error,
            } => {
                self.on_transfer_finish(peer_id, resource_name, source_path, error)
                    .await
            }
            TransportEvent::ByteStreamOpened {
                peer_id,
                stream_name,
            } => self.on_byte_stream_opened(peer_id, stream_name).await,
        }
    }
}
