use std::fmt;
use std::path::Path;

use clouddisk_protocol::constants::{DEFAULT_TRANSFER_CHUNK_SIZE, MAX_FILE_SIZE};
use clouddisk_protocol::messages::FileMetadata;
use clouddisk_transfer::TransferId;

/// A local file staged for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Reads a file from disk, naming it after the last path component.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, data })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Limits applied by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploaderConfig {
    /// Files above this size are rejected before any request.
    pub max_file_size: u64,
    /// Files above this size take the resumable path, split at this size.
    pub transfer_chunk_size: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            transfer_chunk_size: DEFAULT_TRANSFER_CHUNK_SIZE,
        }
    }
}

/// Step of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Init,
    Hashing,
    QuickCheck,
    QuickUploadDone,
    Encrypting,
    PlainUpload,
    ResumableInit,
    ChunkUpload { index: usize, total: usize },
    Completing,
    Done,
    Failed,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::QuickUploadDone | Self::Done | Self::Failed)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Hashing => f.write_str("hashing"),
            Self::QuickCheck => f.write_str("quick-check"),
            Self::QuickUploadDone => f.write_str("quick-upload-done"),
            Self::Encrypting => f.write_str("encrypting"),
            Self::PlainUpload => f.write_str("plain-upload"),
            Self::ResumableInit => f.write_str("resumable-init"),
            Self::ChunkUpload { index, total } => write!(f, "chunk {}/{total}", index + 1),
            Self::Completing => f.write_str("completing"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// How a file reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMethod {
    /// Content already known; linked by hash.
    Quick,
    /// Single multipart request.
    Plain,
    /// Session with sequential chunks.
    Resumable,
    /// Client-side encrypted upload.
    Encrypted,
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub transfer: TransferId,
    pub method: TransferMethod,
    pub metadata: FileMetadata,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    StateChanged {
        transfer: TransferId,
        file_name: String,
        state: TransferState,
    },
    /// Percent never decreases for a transfer.
    Progress {
        transfer: TransferId,
        file_name: String,
        percent: u8,
    },
    Completed {
        transfer: TransferId,
        file_name: String,
        method: TransferMethod,
    },
    /// Exactly one per failed transfer.
    Failed {
        transfer: TransferId,
        file_name: String,
        message: String,
    },
}

/// Callback invoked after every successful transfer so listings can be reloaded.
pub type RefreshCallback = Box<dyn Fn(&TransferOutcome) + Send + Sync>;
