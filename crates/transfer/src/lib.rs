//! Content hashing, fixed-size chunking and per-transfer bookkeeping.
//!
//! Two chunk sizes live side by side in this crate's callers: the transfer
//! chunk size (resumable upload granularity) and the dedup block size
//! (delta-sync granularity). [`ChunkSplitter`] is parameterised so each
//! caller picks its own.

mod chunked;
mod progress;
mod types;
mod validation;

pub use chunked::{
    ChunkSplitter, EMPTY_SHA256, checksum_bytes, checksum_range, compare_hashes,
};
pub use progress::{ProgressCallback, ProgressRegistry, ProgressSnapshot, TransferId};
pub use types::{Chunk, ChunkHash, UploadSession};
pub use validation::{normalize_remote_path, validate_file_size};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("file too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("chunk {index} out of order, expected {expected}")]
    ChunkOutOfOrder { index: usize, expected: usize },

    #[error("session {0} already received every chunk")]
    SessionOverflow(String),

    #[error("session not active: {0}")]
    SessionNotActive(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
