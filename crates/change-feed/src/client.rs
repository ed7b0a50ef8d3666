//! Change feed client with fixed-delay reconnection.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clouddisk_api::{ApiError, ByteStream};

use crate::connector::FeedConnector;
use crate::decoder::FrameDecoder;
use crate::types::{FeedConfig, FeedEvent};

/// Running flag and reconnect counter of one feed run.
#[derive(Default)]
struct FeedState {
    running: AtomicBool,
    attempts: AtomicU32,
}

/// A started feed task. Every `start()` creates a new one, so a cancelled
/// task can only ever touch its own state.
struct FeedRun {
    cancel: CancellationToken,
    state: Arc<FeedState>,
}

/// How a connected stream ended.
enum StreamEnd {
    Cancelled,
    Closed,
    Failed(ApiError),
}

/// Keeps the server change feed open and forwards refresh events.
pub struct ChangeFeedClient {
    connector: Arc<dyn FeedConnector>,
    config: FeedConfig,
    run: Mutex<Option<FeedRun>>,
    events_tx: mpsc::Sender<FeedEvent>,
    events_rx: Option<mpsc::Receiver<FeedEvent>>,
}

impl ChangeFeedClient {
    pub fn new(connector: Arc<dyn FeedConnector>, config: FeedConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            connector,
            config,
            run: Mutex::new(None),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<FeedEvent>> {
        self.events_rx.take()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Starts the feed in a background task and resets the reconnect
    /// counter. A running feed is restarted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let token = CancellationToken::new();
        let state = Arc::new(FeedState::default());
        state.running.store(true, Ordering::SeqCst);

        let previous = self.lock_run().replace(FeedRun {
            cancel: token.clone(),
            state: Arc::clone(&state),
        });
        if let Some(old) = previous {
            debug!("restarting change feed");
            old.cancel.cancel();
        }
        info!("change feed started");

        tokio::spawn(run_feed(
            Arc::clone(&self.connector),
            self.config,
            state,
            self.events_tx.clone(),
            token,
        ));
    }

    /// Stops the feed, cancelling the in-flight read. No reconnect follows.
    pub fn stop(&self) {
        let run = self.lock_run().take();
        if let Some(run) = run {
            run.state.running.store(false, Ordering::SeqCst);
            run.cancel.cancel();
            info!("change feed stopped");
        }
    }

    /// `true` while the feed is running and has not exhausted its
    /// reconnect attempts.
    pub fn is_connected(&self) -> bool {
        self.lock_run().as_ref().is_some_and(|run| {
            run.state.running.load(Ordering::SeqCst)
                && run.state.attempts.load(Ordering::SeqCst) < self.config.max_reconnect_attempts
        })
    }

    /// Reconnect attempts made since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.lock_run()
            .as_ref()
            .map_or(0, |run| run.state.attempts.load(Ordering::SeqCst))
    }

    fn lock_run(&self) -> std::sync::MutexGuard<'_, Option<FeedRun>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChangeFeedClient {
    fn drop(&mut self) {
        if let Some(run) = self
            .run
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            run.cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Feed task
// ---------------------------------------------------------------------------

async fn run_feed(
    connector: Arc<dyn FeedConnector>,
    config: FeedConfig,
    state: Arc<FeedState>,
    events_tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
) {
    loop {
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            r = connector.connect() => r,
        };

        match connected {
            Ok(stream) => {
                state.attempts.store(0, Ordering::SeqCst);
                info!("change feed connected");
                emit(&events_tx, FeedEvent::Connected);

                match read_stream(stream, &events_tx, &cancel).await {
                    StreamEnd::Cancelled => return,
                    StreamEnd::Closed => info!("change feed closed by server"),
                    StreamEnd::Failed(e) => warn!(error = %e, "change feed read failed"),
                }
                emit(&events_tx, FeedEvent::Disconnected);
            }
            Err(e) => warn!(error = %e, "change feed connection failed"),
        }

        if cancel.is_cancelled() {
            return;
        }

        let attempts = state.attempts.load(Ordering::SeqCst);
        if attempts >= config.max_reconnect_attempts {
            warn!(attempts, "change feed giving up");
            state.running.store(false, Ordering::SeqCst);
            emit(&events_tx, FeedEvent::GaveUp);
            return;
        }

        let attempt = attempts + 1;
        state.attempts.store(attempt, Ordering::SeqCst);
        info!(
            attempt,
            max = config.max_reconnect_attempts,
            delay_secs = format_args!("{:.1}", config.reconnect_delay.as_secs_f64()),
            "reconnecting change feed"
        );
        emit(&events_tx, FeedEvent::Reconnecting { attempt });

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("change feed reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}

async fn read_stream(
    mut stream: ByteStream,
    events_tx: &mpsc::Sender<FeedEvent>,
    cancel: &CancellationToken,
) -> StreamEnd {
    let mut decoder = FrameDecoder::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            next = stream.next() => next,
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => return StreamEnd::Failed(e),
            None => return StreamEnd::Closed,
        };

        for event in decoder.push(&bytes) {
            if event.event_type.triggers_refresh() {
                info!(
                    kind = event.event_type.as_str(),
                    name = event.name.as_deref().unwrap_or(""),
                    "remote change"
                );
                emit(events_tx, FeedEvent::Refresh(event));
            } else {
                debug!(kind = event.event_type.as_str(), ?event, "unknown sync event");
            }
        }
    }
}

fn emit(events_tx: &mpsc::Sender<FeedEvent>, event: FeedEvent) {
    if let Err(e) = events_tx.try_send(event) {
        warn!("failed to forward change feed event: {e}");
    }
}
