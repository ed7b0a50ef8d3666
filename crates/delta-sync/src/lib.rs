//! Chunk-level delta sync.
//!
//! A new version of a remote file is split into dedup blocks and compared
//! against the server's chunk signatures; only blocks the server does not
//! already hold are sent.

mod engine;
mod signatures;

pub use engine::{DeltaPatch, DeltaSyncEngine, Reconciliation, SyncOutcome};
pub use signatures::ChunkSignatureSet;

use clouddisk_api::{ApiError, ErrorKind};
use clouddisk_transfer::TransferError;

/// Errors from delta sync.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Transfer(#[from] TransferError),

    #[error("malformed signatures: {0}")]
    Protocol(String),
}

impl DeltaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(e) => e.kind(),
            Self::Transfer(_) => ErrorKind::Validation,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }
}
