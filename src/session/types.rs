use crate::peer::PeerId;
use crate::storage::StorageError;

/// Everything that can go wrong while handling one transport event.
///
/// None of these are fatal: the handler logs them and keeps processing.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The metadata payload was not an object of objects
    #[error("Malformed action info payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The transport reported an event for a peer that was never registered
    #[error("Event for unregistered peer {0}")]
    UnknownPeer(PeerId),

    /// A transfer finished without a source file and without an error
    #[error("Transfer of {resource_name:?} finished without a source path")]
    MissingSourcePath { resource_name: String },

    /// The transport itself reported the transfer as failed
    #[error("Transfer of {resource_name:?} failed in transport: {reason}")]
    TransportFailed {
        resource_name: String,
        reason: String,
    },

    /// Resolving or writing the destination failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether this error came from placing a resource on disk
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
