//! Wire types shared by every clouddisk engine crate.
//!
//! Request/response bodies of the REST API, the `{success, message, code,
//! data}` response envelope, change-feed events, and the encryption sidecar.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{ApiResponse, BusinessFailure};
pub use types::{EncryptionMetadata, SyncEvent, SyncEventType, UploadStatus};
