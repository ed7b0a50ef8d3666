//! Line framing of the event stream.

use tracing::{debug, warn};

use clouddisk_protocol::SyncEvent;
use clouddisk_protocol::constants::FEED_DATA_PREFIX;

/// Incremental decoder for `data:` lines of a server-sent event stream.
///
/// Bytes are buffered until a `\n`; an unterminated tail is kept for the
/// next push. Only complete lines are parsed.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SyncEvent> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            if let Some(event) = parse_line(&self.buf[start..end]) {
                events.push(event);
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        events
    }

    /// Bytes of the pending unterminated line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

fn parse_line(raw: &[u8]) -> Option<SyncEvent> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let Ok(line) = std::str::from_utf8(raw) else {
        warn!(len = raw.len(), "skipping non-UTF-8 change feed line");
        return None;
    };

    let payload = line.strip_prefix(FEED_DATA_PREFIX)?;
    if !payload.trim_start().starts_with('{') {
        // Handshake lines such as "data: connected".
        debug!(payload, "ignoring non-event data line");
        return None;
    }

    match serde_json::from_str::<SyncEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, line, "malformed change feed event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clouddisk_protocol::SyncEventType;

    #[test]
    fn single_complete_line() {
        let mut dec = FrameDecoder::new();
        let events = dec.push(b"data: {\"type\":\"upload\",\"fileId\":\"f1\",\"name\":\"a.txt\"}\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SyncEventType::Upload);
        assert_eq!(events[0].file_id.as_deref(), Some("f1"));
        assert_eq!(events[0].name.as_deref(), Some("a.txt"));
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn line_split_across_pushes() {
        let mut dec = FrameDecoder::new();
        assert!(dec.push(b"data: {\"type\":\"del").is_empty());
        assert!(dec.pending() > 0);
        let events = dec.push(b"ete\",\"path\":\"/x\"}\ndata: {\"type\":\"mkdir\"");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SyncEventType::Delete);
        assert_eq!(events[0].path.as_deref(), Some("/x"));

        let events = dec.push(b"}\n");
        assert_eq!(events[0].event_type, SyncEventType::Mkdir);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn carriage_return_tolerated() {
        let mut dec = FrameDecoder::new();
        let events = dec.push(b"data: {\"type\":\"delta-update\"}\r\n");
        assert_eq!(events[0].event_type, SyncEventType::DeltaUpdate);
    }

    #[test]
    fn malformed_and_foreign_lines_skipped() {
        let mut dec = FrameDecoder::new();
        let input = b"event: file-change\n\
                      data: {not json\n\
                      : keepalive\n\
                      data: connected at 2024-01-01\n\
                      \n\
                      data: {\"type\":\"quick-upload\"}\n";
        let events = dec.push(input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SyncEventType::QuickUpload);
    }

    #[test]
    fn unknown_type_is_preserved() {
        let mut dec = FrameDecoder::new();
        let events = dec.push(b"data: {\"type\":\"rename\"}\n");
        assert_eq!(events[0].event_type, SyncEventType::Unknown("rename".into()));
    }

    #[test]
    fn clear_drops_partial_line() {
        let mut dec = FrameDecoder::new();
        dec.push(b"data: {\"type\":");
        dec.clear();
        assert!(dec.push(b"\"upload\"}\n").is_empty());
    }
}
