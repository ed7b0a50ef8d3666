use std::collections::BTreeSet;

use clouddisk_protocol::messages::ChunkSignature;

use crate::DeltaError;

/// Set of chunk hashes the server already holds for a file.
///
/// Only membership matters; order and position of remote chunks are not
/// used when deciding what to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSignatureSet {
    hashes: BTreeSet<String>,
    chunk_count: usize,
}

impl ChunkSignatureSet {
    /// Builds the set from the server's signature list.
    ///
    /// Hashes are compared case-insensitively. An empty hash means the
    /// payload is malformed.
    pub fn from_signatures(signatures: &[ChunkSignature]) -> Result<Self, DeltaError> {
        let mut hashes = BTreeSet::new();
        for sig in signatures {
            let hash = sig.hash.trim();
            if hash.is_empty() {
                return Err(DeltaError::Protocol(format!(
                    "chunk {} has an empty hash",
                    sig.chunk_index
                )));
            }
            hashes.insert(hash.to_ascii_lowercase());
        }
        Ok(Self {
            hashes,
            chunk_count: signatures.len(),
        })
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(&hash.to_ascii_lowercase())
    }

    /// Number of chunks the remote version consists of.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
