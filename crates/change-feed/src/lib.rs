//! Live change notifications from the clouddisk server.
//!
//! [`ChangeFeedClient`] keeps a `GET /files/sync` event stream open, turns
//! `data:` lines into [`SyncEvent`](clouddisk_protocol::SyncEvent)s and
//! reconnects after a fixed delay, up to a bounded number of consecutive
//! attempts.

mod client;
mod connector;
mod decoder;
mod types;

pub use client::ChangeFeedClient;
pub use connector::{FeedConnector, FeedFuture, HttpFeedConnector};
pub use decoder::FrameDecoder;
pub use types::{FeedConfig, FeedEvent};

use clouddisk_api::ApiError;

/// Errors from the change feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("{0}")]
    Api(#[from] ApiError),
}
