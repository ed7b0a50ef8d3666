//! Upload orchestration for clouddisk.
//!
//! [`TransferOrchestrator`] drives a file through quick upload, a single
//! multipart request or a resumable chunked session, and handles
//! client-side encrypted uploads.

mod error;
mod orchestrator;
mod types;

pub use error::UploadError;
pub use orchestrator::TransferOrchestrator;
pub use types::{
    LocalFile, RefreshCallback, TransferEvent, TransferMethod, TransferOutcome, TransferState,
    UploaderConfig,
};
