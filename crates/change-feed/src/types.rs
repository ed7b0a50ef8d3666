use std::time::Duration;

use clouddisk_protocol::SyncEvent;
use clouddisk_protocol::constants::{FEED_MAX_RECONNECT_ATTEMPTS, FEED_RECONNECT_DELAY};

/// Reconnect policy of the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    /// Fixed wait before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: FEED_RECONNECT_DELAY,
            max_reconnect_attempts: FEED_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Events emitted by [`ChangeFeedClient`](crate::ChangeFeedClient).
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The stream is open.
    Connected,
    /// The remote listing changed; callers should reload it.
    Refresh(SyncEvent),
    /// The stream ended or failed while the feed was running.
    Disconnected,
    /// A reconnect is scheduled after the configured delay.
    Reconnecting { attempt: u32 },
    /// The attempt cap was reached. The feed stays down until restarted.
    GaveUp,
}
