//! # Nearby Session
//!
//! Session event handling for peer-to-peer resource transfers between nearby
//! devices. A connectivity transport reports what happens on a session; this
//! crate keeps track of peers, remembers the action info that precedes a
//! file, places received files on disk and tells the application about it.
//!
//! ## Architecture Overview
//!
//! - **[`peer`]**: Peer records, connection and transfer state, the shared registry
//! - **[`action_info`]**: Per-resource metadata waiting for its file to arrive
//! - **[`storage`]**: Choosing a destination and placing files atomically
//! - **[`session`]**: The event handler state machine, transport contract and event delivery
//! - **[`config`]**: TOML service configuration
//! - **[`cli`]**: The `nearby` command line tool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nearby_session::{
//!     PeerId, PeerItem, ServiceConfig, SessionEventHandler, TransportDelegate, TransportEvent,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let handler = SessionEventHandler::new(&ServiceConfig::default());
//!     handler.prepare_storage().await?;
//!     handler
//!         .registry()
//!         .insert(PeerItem::new("peer-1", "Alice's phone", true));
//!
//!     let mut events = handler.subscribe();
//!     handler
//!         .dispatch(TransportEvent::DataReceived {
//!             peer_id: PeerId::from("peer-1"),
//!             data: br#"{"photo.jpg":{"album":"trip"}}"#.to_vec(),
//!         })
//!         .await;
//!
//!     while let Some(event) = events.try_recv() {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

/// Peer identity, state and the shared registry.
pub mod peer;

/// Action info records and the cache that pairs them with transfers.
pub mod action_info;

/// On-disk placement of received resources.
pub mod storage;

/// Session event handling.
///
/// Turns transport callbacks into registry updates, file placements and
/// application events, with per-peer ordering.
pub mod session;

pub mod config;

/// Environment constants and path utilities.
///
/// Centralizes the directory and file names used throughout the crate.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use action_info::{ActionInfo, ActionInfoCache, ActionInfoCacheConfig};
pub use config::{ActionInfoConfig, ServiceConfig, StorageConfig};
pub use peer::{ConnectionState, PeerId, PeerItem, PeerRegistry, TransferProgress, TransferState};
pub use session::{
    EventBus, EventSink, LoggingEventSink, SessionError, SessionEvent, SessionEventHandler,
    Subscription, TransportDelegate, TransportEvent,
};
pub use storage::{
    Destination, FileDestinationResolver, ResourceStore, StorageArea, StorageError,
};
