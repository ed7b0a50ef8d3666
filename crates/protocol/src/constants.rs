use std::time::Duration;

/// Largest file accepted for upload (100 MiB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Granularity of resumable uploads (2 MiB).
///
/// Files at or below this size take the plain upload path.
pub const DEFAULT_TRANSFER_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Granularity of content addressing for delta sync (4 MiB).
///
/// Must match the block size the server uses when it stores chunk
/// signatures. Independent of [`DEFAULT_TRANSFER_CHUNK_SIZE`].
pub const DEFAULT_DEDUP_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Timeout applied to plain file downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed delay between change-feed reconnect attempts.
pub const FEED_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Consecutive change-feed reconnect attempts before giving up.
pub const FEED_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Prefix of change-feed lines carrying a JSON event.
pub const FEED_DATA_PREFIX: &str = "data: ";

/// REST endpoint paths, relative to the API base URL.
pub mod endpoints {
    pub const QUICK_CHECK: &str = "/files/quick-check";
    pub const QUICK_UPLOAD: &str = "/files/quick-upload";
    pub const UPLOAD: &str = "/files/upload";
    pub const UPLOAD_ENCRYPTED: &str = "/files/upload-encrypted";
    pub const CONVERGENT_CHECK: &str = "/files/convergent-check";
    pub const RESUMABLE_INIT: &str = "/files/resumable/init";
    pub const RESUMABLE_SESSIONS: &str = "/files/resumable/sessions";
    pub const SYNC: &str = "/files/sync";

    /// `POST /files/resumable/{session}/chunk/{index}`
    pub fn resumable_chunk(session_id: &str, index: usize) -> String {
        format!("/files/resumable/{session_id}/chunk/{index}")
    }

    /// `POST /files/resumable/{session}/complete`
    pub fn resumable_complete(session_id: &str) -> String {
        format!("/files/resumable/{session_id}/complete")
    }

    /// `GET /files/{id}/signatures`
    pub fn signatures(file_id: &str) -> String {
        format!("/files/{file_id}/signatures")
    }

    /// `POST /files/{id}/delta`
    pub fn delta(file_id: &str) -> String {
        format!("/files/{file_id}/delta")
    }

    /// `GET /files/{id}/encryption`
    pub fn encryption(file_id: &str) -> String {
        format!("/files/{file_id}/encryption")
    }

    /// `GET /files/{id}/download`
    pub fn download(file_id: &str) -> String {
        format!("/files/{file_id}/download")
    }
}
