use std::ops::Range;

use clouddisk_protocol::UploadStatus;

use crate::TransferError;

/// A contiguous byte range `[start, end)` of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of the chunk within the file.
    pub index: usize,
    /// First byte offset (inclusive).
    pub start: usize,
    /// Last byte offset (exclusive).
    pub end: usize,
}

impl Chunk {
    /// Size of this chunk in bytes.
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    /// Byte range covered by this chunk.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Borrows this chunk's bytes out of the whole-file buffer.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than `end`.
    pub fn data<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.range()]
    }
}

/// Content hash of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHash {
    pub index: usize,
    /// SHA-256 lowercase hex of the chunk bytes only.
    pub hash: String,
    pub size: usize,
}

/// Client-side view of a resumable upload session.
///
/// Lives only as long as the transfer that created it; the server owns the
/// durable session state.
#[derive(Debug, Clone)]
pub struct UploadSession {
    session_id: String,
    file_name: String,
    path: String,
    total_size: u64,
    chunk_size: usize,
    expected_chunks: usize,
    uploaded_chunks: usize,
    status: UploadStatus,
    error: String,
}

impl UploadSession {
    /// Creates an initialized session expecting `ceil(total_size / chunk_size)` chunks.
    pub fn new(
        session_id: impl Into<String>,
        file_name: impl Into<String>,
        path: impl Into<String>,
        total_size: u64,
        chunk_size: usize,
    ) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        Ok(Self {
            session_id: session_id.into(),
            file_name: file_name.into(),
            path: path.into(),
            total_size,
            chunk_size,
            expected_chunks: total_size.div_ceil(chunk_size as u64) as usize,
            uploaded_chunks: 0,
            status: UploadStatus::Initialized,
            error: String::new(),
        })
    }

    /// Marks the session as uploading.
    pub fn start(&mut self) {
        self.status = UploadStatus::Uploading;
    }

    /// Records the acknowledgement of chunk `index`.
    ///
    /// Chunks must be acknowledged strictly in order and never beyond the
    /// expected total.
    pub fn record_chunk(&mut self, index: usize) -> Result<(), TransferError> {
        if self.status != UploadStatus::Uploading {
            return Err(TransferError::SessionNotActive(self.session_id.clone()));
        }
        if self.uploaded_chunks >= self.expected_chunks {
            return Err(TransferError::SessionOverflow(self.session_id.clone()));
        }
        if index != self.uploaded_chunks {
            return Err(TransferError::ChunkOutOfOrder {
                index,
                expected: self.uploaded_chunks,
            });
        }
        self.uploaded_chunks += 1;
        Ok(())
    }

    /// Marks the session as waiting for the server-side merge.
    pub fn begin_completion(&mut self) {
        self.status = UploadStatus::Completing;
    }

    /// Marks the session as completed.
    pub fn complete(&mut self) {
        self.status = UploadStatus::Complete;
    }

    /// Marks the session as failed with an error message.
    pub fn fail(&mut self, err: &str) {
        self.status = UploadStatus::Failed;
        self.error = err.to_string();
    }

    /// Returns `true` if the session has not reached a terminal state.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            UploadStatus::Initialized | UploadStatus::Uploading | UploadStatus::Completing
        )
    }

    /// Returns `true` once every expected chunk was acknowledged.
    pub fn all_chunks_uploaded(&self) -> bool {
        self.uploaded_chunks == self.expected_chunks
    }

    /// Fraction of chunks acknowledged, in `[0.0, 1.0]`.
    pub fn fraction_uploaded(&self) -> f64 {
        if self.expected_chunks == 0 {
            return 1.0;
        }
        self.uploaded_chunks as f64 / self.expected_chunks as f64
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn expected_chunks(&self) -> usize {
        self.expected_chunks
    }

    pub fn uploaded_chunks(&self) -> usize {
        self.uploaded_chunks
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// Last recorded error (empty unless failed).
    pub fn error(&self) -> &str {
        &self.error
    }
}
