use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use clouddisk_api::CloudApi;
use clouddisk_protocol::messages::{DeltaRequest, FileMetadata};
use clouddisk_transfer::{ChunkSplitter, checksum_bytes};

use crate::{ChunkSignatureSet, DeltaError};

/// Blocks of a new file version the server lacks, plus the hash of every
/// block of that version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPatch {
    /// Block index → Base64 bytes, only for blocks missing remotely.
    pub delta_chunks: BTreeMap<usize, String>,
    /// Block index → hex hash, for every block of the new version.
    pub chunk_hashes: BTreeMap<usize, String>,
}

impl DeltaPatch {
    /// Number of blocks carried in full.
    pub fn changed_chunks(&self) -> usize {
        self.delta_chunks.len()
    }

    pub fn total_chunks(&self) -> usize {
        self.chunk_hashes.len()
    }

    /// Wire form; JSON object keys are strings.
    pub fn to_request(&self) -> DeltaRequest {
        DeltaRequest {
            delta_chunks: self
                .delta_chunks
                .iter()
                .map(|(i, data)| (i.to_string(), data.clone()))
                .collect(),
            chunk_hashes: self
                .chunk_hashes
                .iter()
                .map(|(i, hash)| (i.to_string(), hash.clone()))
                .collect(),
        }
    }
}

/// Result of comparing a new version with the remote signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Every block is known remotely and the block count matches.
    Unchanged,
    Patch(DeltaPatch),
}

/// What [`DeltaSyncEngine::sync_file`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub file_id: String,
    pub changed_chunks: usize,
    pub total_chunks: usize,
    /// Metadata returned by the server; `None` when nothing was sent.
    pub metadata: Option<FileMetadata>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.metadata.is_none()
    }
}

/// Computes and applies block-level deltas.
#[derive(Debug, Clone, Copy)]
pub struct DeltaSyncEngine {
    splitter: ChunkSplitter,
}

impl DeltaSyncEngine {
    /// Creates an engine splitting files into `dedup_block_size` blocks.
    ///
    /// The block size must match the one the server used for its signatures.
    pub fn new(dedup_block_size: usize) -> Result<Self, DeltaError> {
        Ok(Self {
            splitter: ChunkSplitter::new(dedup_block_size)?,
        })
    }

    pub fn block_size(&self) -> usize {
        self.splitter.chunk_size()
    }

    /// Compares `data` against the remote `signatures`.
    pub fn reconcile(&self, signatures: &ChunkSignatureSet, data: &[u8]) -> Reconciliation {
        let mut patch = DeltaPatch::default();

        for block in self.splitter.split_bytes(data) {
            let bytes = block.data(data);
            let hash = checksum_bytes(bytes);
            if !signatures.contains(&hash) {
                patch.delta_chunks.insert(block.index, STANDARD.encode(bytes));
            }
            patch.chunk_hashes.insert(block.index, hash);
        }

        if patch.delta_chunks.is_empty() && patch.total_chunks() == signatures.chunk_count() {
            Reconciliation::Unchanged
        } else {
            Reconciliation::Patch(patch)
        }
    }

    /// Syncs `data` as the new content of remote file `file_id`.
    ///
    /// Signatures are fetched before any hashing; a failed fetch aborts the
    /// sync. Nothing is sent when the content is unchanged.
    pub async fn sync_file<A: CloudApi + ?Sized>(
        &self,
        api: &A,
        file_id: &str,
        data: &[u8],
    ) -> Result<SyncOutcome, DeltaError> {
        let signatures = api.get_signatures(file_id).await?;
        let remote = ChunkSignatureSet::from_signatures(&signatures)?;
        debug!(
            file = file_id,
            remote_chunks = remote.chunk_count(),
            "fetched signatures"
        );

        let patch = match self.reconcile(&remote, data) {
            Reconciliation::Unchanged => {
                let total = self.splitter.chunk_count(data.len() as u64);
                info!(file = file_id, total, "content unchanged, nothing to sync");
                return Ok(SyncOutcome {
                    file_id: file_id.to_string(),
                    changed_chunks: 0,
                    total_chunks: total,
                    metadata: None,
                });
            }
            Reconciliation::Patch(patch) => patch,
        };

        let changed = patch.changed_chunks();
        let total = patch.total_chunks();
        info!(file = file_id, changed, total, "sending delta");

        let metadata = api.apply_delta(file_id, &patch.to_request()).await?;
        info!(file = file_id, changed, total, "delta applied");

        Ok(SyncOutcome {
            file_id: file_id.to_string(),
            changed_chunks: changed,
            total_chunks: total,
            metadata: Some(metadata),
        })
    }
}
