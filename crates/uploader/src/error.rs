//! Upload error types.

use clouddisk_api::{ApiError, ErrorKind};
use clouddisk_crypto::CryptoError;
use clouddisk_transfer::TransferError;

/// Errors produced while transferring a file.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(#[from] TransferError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Crypto(#[from] CryptoError),

    #[error("chunk {}/{total} failed: {source}", .index + 1)]
    ChunkFailed {
        index: usize,
        total: usize,
        #[source]
        source: ApiError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Io(_) => ErrorKind::Validation,
            Self::Api(e) | Self::ChunkFailed { source: e, .. } => e.kind(),
            Self::Crypto(_) => ErrorKind::Crypto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_failure_message_is_one_based() {
        let err = UploadError::ChunkFailed {
            index: 1,
            total: 3,
            source: ApiError::Status {
                status: 500,
                body: "disk full".into(),
            },
        };
        assert_eq!(err.to_string(), "chunk 2/3 failed: API error 500: disk full");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn kinds_follow_source() {
        let err = UploadError::from(TransferError::FileTooLarge { size: 2, max: 1 });
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(UploadError::from(ApiError::Auth).kind(), ErrorKind::Auth);
        assert_eq!(
            UploadError::from(CryptoError::InvalidIterations).kind(),
            ErrorKind::Crypto
        );
    }
}
