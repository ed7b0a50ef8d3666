use std::ops::Range;

use sha2::{Digest, Sha256};

use crate::TransferError;
use crate::types::{Chunk, ChunkHash};

/// SHA-256 of the empty input.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the lowercase hex digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of `data[range]`.
///
/// # Panics
///
/// Panics if `range` is out of bounds for `data`.
pub fn checksum_range(data: &[u8], range: Range<usize>) -> String {
    checksum_bytes(&data[range])
}

/// Compares two hex digests ignoring case.
pub fn compare_hashes(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

// ---------------------------------------------------------------------------
// ChunkSplitter
// ---------------------------------------------------------------------------

/// Partitions byte sequences into fixed-size, offset-aligned chunks.
///
/// The final chunk may be shorter; an empty input has no chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSplitter {
    chunk_size: usize,
}

impl ChunkSplitter {
    /// Creates a splitter. A zero `chunk_size` is rejected.
    pub fn new(chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        Ok(Self { chunk_size })
    }

    /// Configured chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks a `len`-byte input splits into: `ceil(len / size)`.
    pub fn chunk_count(&self, len: u64) -> usize {
        len.div_ceil(self.chunk_size as u64) as usize
    }

    /// Returns the chunk layout for an input of `len` bytes.
    pub fn split(&self, len: usize) -> Vec<Chunk> {
        (0..self.chunk_count(len as u64))
            .map(|index| {
                let start = index * self.chunk_size;
                let end = std::cmp::min(start + self.chunk_size, len);
                Chunk { index, start, end }
            })
            .collect()
    }

    /// Returns the chunk layout for `data`.
    pub fn split_bytes(&self, data: &[u8]) -> Vec<Chunk> {
        self.split(data.len())
    }

    /// Hashes every chunk of `data` in index order.
    pub fn hash_chunks(&self, data: &[u8]) -> Vec<ChunkHash> {
        self.split_bytes(data)
            .into_iter()
            .map(|chunk| ChunkHash {
                index: chunk.index,
                hash: checksum_range(data, chunk.range()),
                size: chunk.size(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn checksum_bytes_deterministic() {
        let c1 = checksum_bytes(b"hello world");
        let c2 = checksum_bytes(b"hello world");
        assert_eq!(c1, c2);
        assert_eq!(c1.len(), 64); // SHA-256 = 64 hex chars.
        assert_eq!(c1, c1.to_lowercase());
    }

    #[test]
    fn checksum_bytes_different_data() {
        let c1 = checksum_bytes(b"hello");
        let c2 = checksum_bytes(b"world");
        assert_ne!(c1, c2);
    }

    #[test]
    fn checksum_empty_input() {
        assert_eq!(checksum_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn checksum_known_vector() {
        assert_eq!(
            checksum_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn checksum_range_matches_slice() {
        let data = b"0123456789";
        assert_eq!(checksum_range(data, 2..6), checksum_bytes(b"2345"));
    }

    #[test]
    fn compare_hashes_ignores_case() {
        assert!(compare_hashes("ABcd", "abCD"));
        assert!(!compare_hashes("ab", "ac"));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkSplitter::new(0),
            Err(TransferError::InvalidChunkSize)
        ));
    }

    #[test]
    fn split_reads_all() {
        let data = b"AABBCCDDEE"; // 10 bytes.
        let splitter = ChunkSplitter::new(4).unwrap();
        let chunks = splitter.split_bytes(data);
        assert_eq!(chunks.len(), 3);

        assert_eq!((chunks[0].start, chunks[0].end), (0, 4));
        assert_eq!(chunks[0].data(data), b"AABB");
        assert_eq!(chunks[1].data(data), b"CCDD");
        assert_eq!(chunks[2].data(data), b"EE");
        assert_eq!(chunks[2].size(), 2);
    }

    #[test]
    fn split_empty_input() {
        let splitter = ChunkSplitter::new(4).unwrap();
        assert!(splitter.split(0).is_empty());
        assert_eq!(splitter.chunk_count(0), 0);
        assert!(splitter.hash_chunks(b"").is_empty());
    }

    #[test]
    fn split_exact_multiple() {
        let splitter = ChunkSplitter::new(5).unwrap();
        let chunks = splitter.split(10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].size(), 5);
    }

    #[test]
    fn split_reassembles_original() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        for size in [1, 3, 7, 64, 999, 1000, 1001, 4096] {
            let splitter = ChunkSplitter::new(size).unwrap();
            let chunks = splitter.split_bytes(&data);
            assert_eq!(chunks.len(), data.len().div_ceil(size), "size {size}");

            let mut rebuilt = Vec::with_capacity(data.len());
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
                rebuilt.extend_from_slice(chunk.data(&data));
            }
            assert_eq!(rebuilt, data, "size {size}");
        }
    }

    #[test]
    fn ten_mib_with_four_mib_blocks() {
        let splitter = ChunkSplitter::new(4 * MIB).unwrap();
        let chunks = splitter.split(10 * MIB);
        let sizes: Vec<usize> = chunks.iter().map(Chunk::size).collect();
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(sizes, vec![4 * MIB, 4 * MIB, 2 * MIB]);
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn hash_chunks_content_addressed() {
        // Chunks 0 and 2 carry identical bytes and must hash identically.
        let data = b"AAAABBBBAAAA";
        let splitter = ChunkSplitter::new(4).unwrap();
        let hashes = splitter.hash_chunks(data);
        assert_eq!(hashes.len(), 3);
        assert_eq!(hashes[0].hash, hashes[2].hash);
        assert_ne!(hashes[0].hash, hashes[1].hash);
        assert_eq!(hashes[1].hash, checksum_bytes(b"BBBB"));
        assert_eq!(hashes[2].size, 4);
    }
}
