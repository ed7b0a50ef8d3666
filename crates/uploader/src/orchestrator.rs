//! Transfer orchestrator.
//!
//! Picks the cheapest way to get a file onto the server: link existing
//! content by hash, a single multipart request, or a resumable session
//! with sequential chunks. Progress and state changes are published on an
//! event channel and in a shared [`ProgressRegistry`].

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use clouddisk_api::CloudApi;
use clouddisk_crypto::{EncryptOptions, EncryptionEngine};
use clouddisk_protocol::messages::{
    FileMetadata, QuickUploadRequest, ResumableInitRequest, UploadSessionInfo,
};
use clouddisk_transfer::{
    ChunkSplitter, ProgressRegistry, TransferId, UploadSession, checksum_bytes,
    normalize_remote_path, validate_file_size,
};

use crate::error::UploadError;
use crate::types::{
    LocalFile, RefreshCallback, TransferEvent, TransferMethod, TransferOutcome, TransferState,
    UploaderConfig,
};

/// Share of the progress bar covered by chunk uploads; the rest is
/// reserved for the server-side merge.
const CHUNK_PROGRESS_SPAN: f64 = 90.0;
const COMPLETING_PERCENT: u8 = 95;
const QUICK_CHECK_HIT_PERCENT: u8 = 50;
const PLAIN_UPLOAD_PERCENT: u8 = 10;
const ENCRYPTING_PERCENT: u8 = 10;
const ENCRYPTED_PERCENT: u8 = 50;

/// Orchestrates uploads of local files.
pub struct TransferOrchestrator {
    api: Arc<dyn CloudApi>,
    crypto: EncryptionEngine,
    config: UploaderConfig,
    splitter: ChunkSplitter,
    progress: Arc<ProgressRegistry>,
    refresh: RwLock<Vec<RefreshCallback>>,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
}

impl TransferOrchestrator {
    /// Creates an orchestrator talking to `api`.
    pub fn new(api: Arc<dyn CloudApi>, config: UploaderConfig) -> Result<Self, UploadError> {
        let splitter = ChunkSplitter::new(config.transfer_chunk_size)?;
        let (events_tx, events_rx) = mpsc::channel(256);
        Ok(Self {
            api,
            crypto: EncryptionEngine::new(),
            config,
            splitter,
            progress: Arc::new(ProgressRegistry::new()),
            refresh: RwLock::new(Vec::new()),
            events_tx,
            events_rx: Some(events_rx),
        })
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    /// Progress of in-flight transfers.
    pub fn progress(&self) -> Arc<ProgressRegistry> {
        Arc::clone(&self.progress)
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Registers a callback run after every successful transfer.
    pub fn on_refresh(&self, callback: RefreshCallback) {
        self.refresh
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    /// Uploads `file` into the remote directory `remote_path`.
    ///
    /// Oversized files are rejected before any request. Known content is
    /// linked by hash; otherwise the file goes up in one request or, above
    /// the transfer chunk size, through a resumable session. A failed chunk
    /// aborts the whole transfer.
    pub async fn transfer(
        &self,
        file: &LocalFile,
        remote_path: &str,
    ) -> Result<TransferOutcome, UploadError> {
        let id = self.progress.insert(&file.name);
        let result = self.run_transfer(id, file, remote_path).await;
        self.finish(id, &file.name, result)
    }

    /// Encrypts `file` with `password` and uploads the ciphertext with its
    /// metadata sidecar.
    ///
    /// In convergent mode the server is asked whether it already holds the
    /// same plaintext; the answer is only logged and the ciphertext is
    /// uploaded either way.
    pub async fn transfer_encrypted(
        &self,
        file: &LocalFile,
        remote_path: &str,
        password: &str,
        options: &EncryptOptions,
    ) -> Result<TransferOutcome, UploadError> {
        let id = self.progress.insert(&file.name);
        let result = self
            .run_encrypted(id, file, remote_path, password, options)
            .await;
        self.finish(id, &file.name, result)
    }

    /// Lists resumable sessions the server has not finished.
    pub async fn list_sessions(&self) -> Result<Vec<UploadSessionInfo>, UploadError> {
        let sessions: Vec<UploadSessionInfo> = self
            .api
            .list_sessions()
            .await?
            .into_iter()
            .filter(UploadSessionInfo::is_unfinished)
            .collect();
        debug!(count = sessions.len(), "unfinished upload sessions");
        Ok(sessions)
    }

    // -----------------------------------------------------------------------
    // Pipelines
    // -----------------------------------------------------------------------

    async fn run_transfer(
        &self,
        id: TransferId,
        file: &LocalFile,
        remote_path: &str,
    ) -> Result<(TransferMethod, FileMetadata), UploadError> {
        self.set_state(id, &file.name, TransferState::Init);
        validate_file_size(file.size(), self.config.max_file_size)?;
        let path = normalize_remote_path(remote_path)?;

        self.set_state(id, &file.name, TransferState::Hashing);
        let hash = checksum_bytes(&file.data);
        debug!(transfer = %id, file = %file.name, size = file.size(), hash = %hash, "hashed file");

        self.set_state(id, &file.name, TransferState::QuickCheck);
        if self.api.quick_check(&hash).await? {
            self.set_progress(id, &file.name, QUICK_CHECK_HIT_PERCENT);
            let req = QuickUploadRequest {
                hash,
                file_name: file.name.clone(),
                path: path.clone(),
            };
            match self.api.quick_upload(&req).await {
                Ok(meta) => {
                    info!(transfer = %id, file = %file.name, "quick upload, content already on server");
                    self.set_state(id, &file.name, TransferState::QuickUploadDone);
                    return Ok((TransferMethod::Quick, meta));
                }
                Err(e) if e.is_business() => {
                    warn!(
                        transfer = %id,
                        file = %file.name,
                        error = %e,
                        "quick upload refused, falling back to normal upload"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        if file.data.len() <= self.splitter.chunk_size() {
            self.upload_plain(id, file, &path).await
        } else {
            self.upload_resumable(id, file, &path).await
        }
    }

    async fn upload_plain(
        &self,
        id: TransferId,
        file: &LocalFile,
        path: &str,
    ) -> Result<(TransferMethod, FileMetadata), UploadError> {
        self.set_state(id, &file.name, TransferState::PlainUpload);
        self.set_progress(id, &file.name, PLAIN_UPLOAD_PERCENT);
        let meta = self.api.upload_file(&file.name, path, &file.data).await?;
        Ok((TransferMethod::Plain, meta))
    }

    async fn upload_resumable(
        &self,
        id: TransferId,
        file: &LocalFile,
        path: &str,
    ) -> Result<(TransferMethod, FileMetadata), UploadError> {
        self.set_state(id, &file.name, TransferState::ResumableInit);
        let req = ResumableInitRequest {
            file_name: file.name.clone(),
            path: path.to_string(),
            file_size: file.size(),
        };
        let info = self.api.init_resumable(&req).await?;

        let mut session = UploadSession::new(
            info.session_id,
            &file.name,
            path,
            file.size(),
            self.splitter.chunk_size(),
        )?;
        let total = session.expected_chunks();
        if info.total_chunks > 0 && info.total_chunks as usize != total {
            warn!(
                transfer = %id,
                session = session.session_id(),
                server_chunks = info.total_chunks,
                client_chunks = total,
                "server expects a different chunk count"
            );
        }
        info!(
            transfer = %id,
            session = session.session_id(),
            file = %file.name,
            chunks = total,
            "resumable upload started"
        );

        session.start();
        for chunk in self.splitter.split_bytes(&file.data) {
            self.set_state(
                id,
                &file.name,
                TransferState::ChunkUpload {
                    index: chunk.index,
                    total,
                },
            );

            if let Err(source) = self
                .api
                .upload_chunk(session.session_id(), chunk.index, chunk.data(&file.data))
                .await
            {
                let err = UploadError::ChunkFailed {
                    index: chunk.index,
                    total,
                    source,
                };
                session.fail(&err.to_string());
                return Err(err);
            }
            session.record_chunk(chunk.index)?;

            let percent = (session.fraction_uploaded() * CHUNK_PROGRESS_SPAN).round() as u8;
            self.set_progress(id, &file.name, percent);
        }

        self.set_state(id, &file.name, TransferState::Completing);
        session.begin_completion();
        self.set_progress(id, &file.name, COMPLETING_PERCENT);

        let meta = match self.api.complete_resumable(session.session_id()).await {
            Ok(meta) => meta,
            Err(e) => {
                session.fail(&e.to_string());
                return Err(e.into());
            }
        };
        session.complete();
        Ok((TransferMethod::Resumable, meta))
    }

    async fn run_encrypted(
        &self,
        id: TransferId,
        file: &LocalFile,
        remote_path: &str,
        password: &str,
        options: &EncryptOptions,
    ) -> Result<(TransferMethod, FileMetadata), UploadError> {
        self.set_state(id, &file.name, TransferState::Init);
        validate_file_size(file.size(), self.config.max_file_size)?;
        let path = normalize_remote_path(remote_path)?;

        self.set_state(id, &file.name, TransferState::Encrypting);
        self.set_progress(id, &file.name, ENCRYPTING_PERCENT);
        let encrypted = self
            .crypto
            .encrypt_async(
                file.data.clone(),
                file.name.clone(),
                password.to_string(),
                options.clone(),
            )
            .await?;
        self.set_progress(id, &file.name, ENCRYPTED_PERCENT);

        if options.convergent {
            match self
                .api
                .convergent_check(&encrypted.metadata.original_hash)
                .await
            {
                Ok(true) => {
                    info!(transfer = %id, file = %file.name, "server already holds this content")
                }
                Ok(false) => debug!(transfer = %id, file = %file.name, "convergent content is new"),
                Err(e) => warn!(transfer = %id, error = %e, "convergent check failed"),
            }
        }

        self.set_state(id, &file.name, TransferState::PlainUpload);
        let meta = self
            .api
            .upload_encrypted(&path, &encrypted.ciphertext, &encrypted.metadata)
            .await?;
        Ok((TransferMethod::Encrypted, meta))
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    fn finish(
        &self,
        id: TransferId,
        file_name: &str,
        result: Result<(TransferMethod, FileMetadata), UploadError>,
    ) -> Result<TransferOutcome, UploadError> {
        let outcome = match result {
            Ok((method, metadata)) => {
                self.set_progress(id, file_name, 100);
                self.set_state(id, file_name, TransferState::Done);
                self.emit(TransferEvent::Completed {
                    transfer: id,
                    file_name: file_name.to_string(),
                    method,
                });
                info!(transfer = %id, file = file_name, ?method, "transfer completed");

                let outcome = TransferOutcome {
                    transfer: id,
                    method,
                    metadata,
                };
                let callbacks = self.refresh.read().unwrap_or_else(PoisonError::into_inner);
                for cb in callbacks.iter() {
                    cb(&outcome);
                }
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                self.set_state(id, file_name, TransferState::Failed);
                self.emit(TransferEvent::Failed {
                    transfer: id,
                    file_name: file_name.to_string(),
                    message: message.clone(),
                });
                error!(transfer = %id, file = file_name, kind = ?e.kind(), error = %message, "transfer failed");
                Err(e)
            }
        };
        self.progress.remove(id);
        outcome
    }

    fn set_state(&self, id: TransferId, file_name: &str, state: TransferState) {
        debug!(transfer = %id, state = %state, "state changed");
        self.emit(TransferEvent::StateChanged {
            transfer: id,
            file_name: file_name.to_string(),
            state,
        });
    }

    fn set_progress(&self, id: TransferId, file_name: &str, percent: u8) {
        let before = self.progress.get(id).map(|s| s.percent);
        let Some(after) = self.progress.update(id, percent) else {
            return;
        };
        if before.is_some_and(|b| after.percent > b) {
            self.emit(TransferEvent::Progress {
                transfer: id,
                file_name: file_name.to_string(),
                percent: after.percent,
            });
        }
    }

    fn emit(&self, event: TransferEvent) {
        // Never block a transfer on a slow or absent consumer.
        if let Err(e) = self.events_tx.try_send(event) {
            debug!(error = %e, "transfer event dropped");
        }
    }
}
