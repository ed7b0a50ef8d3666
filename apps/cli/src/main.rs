//! clouddisk command line client.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clouddisk_api::{CloudApi, HttpClient};
use clouddisk_change_feed::{ChangeFeedClient, FeedEvent, HttpFeedConnector};
use clouddisk_crypto::{DEFAULT_ITERATIONS, EncryptOptions, EncryptionEngine};
use clouddisk_delta_sync::DeltaSyncEngine;
use clouddisk_uploader::{LocalFile, TransferEvent, TransferOrchestrator};

use config::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "clouddisk")]
#[command(about = "Upload, sync and watch files on a clouddisk server", long_about = None)]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Uploads a file, reusing server content when possible.
    Upload {
        file: PathBuf,

        /// Remote directory.
        #[arg(long, short = 't', default_value = "/")]
        to: String,

        /// Encrypt on this machine before uploading.
        #[arg(long)]
        encrypt: bool,

        #[arg(long, short = 'p')]
        password: Option<String>,

        /// Derive the salt from the file name so identical uploads match.
        #[arg(long)]
        convergent: bool,

        #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
        iterations: u32,
    },

    /// Sends only the changed blocks of a new version of a remote file.
    Delta { file_id: String, file: PathBuf },

    /// Lists unfinished resumable upload sessions.
    Sessions,

    /// Downloads a file, decrypting it when a password is given.
    Download {
        file_id: String,

        #[arg(long, short = 'o')]
        output: PathBuf,

        #[arg(long, short = 'p')]
        password: Option<String>,
    },

    /// Prints remote changes as they happen.
    Watch,

    /// Prints the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,clouddisk=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = EngineConfig::load()?;
    if let Some(server) = cli.server {
        cfg.api_base_url = server;
    }

    let api: Arc<dyn CloudApi> = Arc::new(
        HttpClient::new(&cfg.api_base_url, cfg.auth_token.as_deref())?
            .with_download_timeout(cfg.download_timeout()),
    );

    match cli.command {
        Command::Upload {
            file,
            to,
            encrypt,
            password,
            convergent,
            iterations,
        } => {
            let options = encrypt.then(|| EncryptOptions {
                iterations,
                convergent,
                ..EncryptOptions::default()
            });
            upload(api, &cfg, &file, &to, password, options).await
        }
        Command::Delta { file_id, file } => delta(api.as_ref(), &cfg, &file_id, &file).await,
        Command::Sessions => sessions(api, &cfg).await,
        Command::Download {
            file_id,
            output,
            password,
        } => download(api.as_ref(), &file_id, &output, password).await,
        Command::Watch => watch(api, &cfg).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

async fn upload(
    api: Arc<dyn CloudApi>,
    cfg: &EngineConfig,
    path: &Path,
    remote_dir: &str,
    password: Option<String>,
    encrypt: Option<EncryptOptions>,
) -> anyhow::Result<()> {
    let file = LocalFile::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut orchestrator = TransferOrchestrator::new(api, cfg.uploader())?;
    if let Some(mut events) = orchestrator.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransferEvent::Progress {
                        file_name, percent, ..
                    } => info!(file = %file_name, percent, "progress"),
                    TransferEvent::StateChanged {
                        file_name, state, ..
                    } => tracing::debug!(file = %file_name, %state, "state"),
                    TransferEvent::Completed { .. } | TransferEvent::Failed { .. } => {}
                }
            }
        });
    }

    let outcome = match encrypt {
        Some(options) => {
            let Some(password) = password else {
                bail!("--encrypt needs --password");
            };
            orchestrator
                .transfer_encrypted(&file, remote_dir, &password, &options)
                .await?
        }
        None => orchestrator.transfer(&file, remote_dir).await?,
    };

    println!(
        "{} -> {} ({:?}, id {})",
        file.name, outcome.metadata.path, outcome.method, outcome.metadata.file_id
    );
    Ok(())
}

async fn delta(
    api: &dyn CloudApi,
    cfg: &EngineConfig,
    file_id: &str,
    path: &Path,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let engine = DeltaSyncEngine::new(cfg.dedup_block_size)?;
    let outcome = engine.sync_file(api, file_id, &data).await?;

    if outcome.is_noop() {
        println!("{file_id}: unchanged");
    } else {
        println!(
            "{file_id}: sent {}/{} blocks",
            outcome.changed_chunks, outcome.total_chunks
        );
    }
    Ok(())
}

async fn sessions(api: Arc<dyn CloudApi>, cfg: &EngineConfig) -> anyhow::Result<()> {
    let orchestrator = TransferOrchestrator::new(api, cfg.uploader())?;
    let sessions = orchestrator.list_sessions().await?;
    if sessions.is_empty() {
        println!("no unfinished uploads");
    }
    for s in sessions {
        println!(
            "{}  {}  {}/{} chunks  {}",
            s.session_id, s.file_name, s.uploaded_chunks, s.total_chunks, s.status
        );
    }
    Ok(())
}

async fn download(
    api: &dyn CloudApi,
    file_id: &str,
    output: &Path,
    password: Option<String>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut data = api.download_file(file_id, &cancel).await?;

    if let Some(password) = password {
        let envelope = api.get_encryption_metadata(file_id).await?;
        match envelope.metadata {
            Some(metadata) if envelope.client_encrypted => {
                data = EncryptionEngine::new()
                    .decrypt_async(data, password, metadata)
                    .await?;
            }
            _ => warn!(file_id, "file is not client-side encrypted, saving as is"),
        }
    }

    tokio::fs::write(output, &data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("{file_id} -> {} ({} bytes)", output.display(), data.len());
    Ok(())
}

async fn watch(api: Arc<dyn CloudApi>, cfg: &EngineConfig) -> anyhow::Result<()> {
    let mut feed = ChangeFeedClient::new(Arc::new(HttpFeedConnector::new(api)), cfg.feed());
    let Some(mut events) = feed.take_events() else {
        bail!("change feed events already taken");
    };
    feed.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                feed.stop();
                return Ok(());
            }
            event = events.recv() => {
                match event {
                    Some(FeedEvent::Refresh(change)) => println!(
                        "{} {}",
                        change.event_type.as_str(),
                        change
                            .path
                            .or(change.name)
                            .or(change.file_id)
                            .unwrap_or_default()
                    ),
                    Some(FeedEvent::GaveUp) => bail!("change feed unavailable"),
                    Some(other) => tracing::debug!(?other, "feed"),
                    None => return Ok(()),
                }
            }
        }
    }
}
