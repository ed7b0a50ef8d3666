use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use clouddisk_api::{ByteStream, CloudApi};

use crate::FeedError;

/// Boxed future returned by [`FeedConnector::connect`].
pub type FeedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FeedError>> + Send + 'a>>;

/// Opens the raw byte stream of the change feed.
pub trait FeedConnector: Send + Sync {
    fn connect(&self) -> FeedFuture<'_, ByteStream>;
}

/// Connects through the REST client (`GET /files/sync`).
pub struct HttpFeedConnector {
    api: Arc<dyn CloudApi>,
}

impl HttpFeedConnector {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }
}

impl FeedConnector for HttpFeedConnector {
    fn connect(&self) -> FeedFuture<'_, ByteStream> {
        Box::pin(async move { Ok(self.api.open_sync_stream().await?) })
    }
}
