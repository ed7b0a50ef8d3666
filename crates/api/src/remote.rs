//! The remote API seam.
//!
//! [`CloudApi`] is implemented by [`HttpClient`](crate::HttpClient) for the
//! real server. The engines only see the trait, so their logic can be tested
//! with in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use clouddisk_protocol::EncryptionMetadata;
use clouddisk_protocol::messages::{
    ChunkSignature, DeltaRequest, EncryptionEnvelope, FileMetadata, QuickUploadRequest,
    ResumableInitRequest, UploadSessionInfo,
};

use crate::ApiError;

/// Boxed future returned by every [`CloudApi`] call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Raw byte stream of the change feed.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiError>> + Send>>;

/// Operations of the clouddisk REST API used by the engines.
pub trait CloudApi: Send + Sync {
    /// `POST /files/quick-check`: does the server already hold content with `hash`?
    fn quick_check<'a>(&'a self, hash: &'a str) -> ApiFuture<'a, bool>;

    /// `POST /files/quick-upload`: links existing content under a new name.
    fn quick_upload<'a>(&'a self, req: &'a QuickUploadRequest) -> ApiFuture<'a, FileMetadata>;

    /// `POST /files/upload`: single multipart upload.
    fn upload_file<'a>(
        &'a self,
        file_name: &'a str,
        path: &'a str,
        data: &'a [u8],
    ) -> ApiFuture<'a, FileMetadata>;

    /// `POST /files/resumable/init`
    fn init_resumable<'a>(
        &'a self,
        req: &'a ResumableInitRequest,
    ) -> ApiFuture<'a, UploadSessionInfo>;

    /// `POST /files/resumable/{session}/chunk/{index}`
    fn upload_chunk<'a>(
        &'a self,
        session_id: &'a str,
        index: usize,
        data: &'a [u8],
    ) -> ApiFuture<'a, ()>;

    /// `POST /files/resumable/{session}/complete`
    fn complete_resumable<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, FileMetadata>;

    /// `GET /files/resumable/sessions`
    fn list_sessions(&self) -> ApiFuture<'_, Vec<UploadSessionInfo>>;

    /// `GET /files/{id}/signatures`
    fn get_signatures<'a>(&'a self, file_id: &'a str) -> ApiFuture<'a, Vec<ChunkSignature>>;

    /// `POST /files/{id}/delta`
    fn apply_delta<'a>(
        &'a self,
        file_id: &'a str,
        delta: &'a DeltaRequest,
    ) -> ApiFuture<'a, FileMetadata>;

    /// `POST /files/upload-encrypted`: ciphertext plus its metadata sidecar.
    fn upload_encrypted<'a>(
        &'a self,
        path: &'a str,
        ciphertext: &'a [u8],
        metadata: &'a EncryptionMetadata,
    ) -> ApiFuture<'a, FileMetadata>;

    /// `GET /files/{id}/encryption`
    fn get_encryption_metadata<'a>(
        &'a self,
        file_id: &'a str,
    ) -> ApiFuture<'a, EncryptionEnvelope>;

    /// `POST /files/convergent-check`
    fn convergent_check<'a>(&'a self, original_hash: &'a str) -> ApiFuture<'a, bool>;

    /// `GET /files/{id}/download`, bounded by the download timeout and `cancel`.
    fn download_file<'a>(
        &'a self,
        file_id: &'a str,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, Vec<u8>>;

    /// `GET /files/sync`: opens the server-sent change feed.
    fn open_sync_stream(&self) -> ApiFuture<'_, ByteStream>;
}
