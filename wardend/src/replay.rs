//! JSON-lines market data replay.
//!
//! One record per line; blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"type":"tick","symbol":"EURUSD","bid":"1.1000","ask":"1.1001","pip_size":"0.0001","server_time":"2024-03-05T10:00:00Z","time_till_close_secs":28800}
//! {"type":"bar","bar":{...BarClose...},"snapshot":{...MarketSnapshot...}}
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use warden_domain::{BarClose, MarketSnapshot};

use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{DaemonEvent, EventBus};

/// One line of a replay file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FeedRecord {
    Tick(MarketSnapshot),
    Bar {
        bar: BarClose,
        snapshot: MarketSnapshot,
    },
}

impl From<FeedRecord> for DaemonEvent {
    fn from(record: FeedRecord) -> Self {
        match record {
            FeedRecord::Tick(snapshot) => DaemonEvent::Tick(snapshot),
            FeedRecord::Bar { bar, snapshot } => DaemonEvent::BarClosed { bar, snapshot },
        }
    }
}

/// Parse replay text into events.
///
/// # Errors
/// Returns `DaemonError::Replay` naming the first malformed line.
pub fn parse(text: &str) -> DaemonResult<Vec<DaemonEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str::<FeedRecord>(line)
                .map(DaemonEvent::from)
                .map_err(|e| DaemonError::Replay(format!("line {}: {}", index + 1, e)))
        })
        .collect()
}

/// Read and parse a replay file.
pub async fn load(path: &Path) -> DaemonResult<Vec<DaemonEvent>> {
    let text = tokio::fs::read_to_string(path).await?;
    let events = parse(&text)?;
    info!(path = %path.display(), count = events.len(), "Replay loaded");
    Ok(events)
}

/// Publish `events` in order, then `Shutdown`.
///
/// Returns the number of market events published.
pub async fn publish(events: Vec<DaemonEvent>, bus: EventBus) -> DaemonResult<usize> {
    let count = events.len();
    for event in events {
        debug!(kind = event.kind(), "Replaying event");
        bus.send(event).await?;
    }
    bus.send(DaemonEvent::Shutdown).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const FEED: &str = r#"
# a tick and a bar
{"type":"tick","symbol":"EURUSD","bid":"1.1000","ask":"1.1001","pip_size":"0.0001","server_time":"2024-03-05T10:00:00Z","time_till_close_secs":28800}

{"type":"bar","bar":{"symbol":"EURUSD","current_bar_open":"2024-03-05T10:15:00Z","close":"1.1004","prev_close":"1.1000"},"snapshot":{"symbol":"EURUSD","bid":"1.1004","ask":"1.1004","pip_size":"0.0001","server_time":"2024-03-05T10:15:00Z","time_till_close_secs":null}}
"#;

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let events = parse(FEED).unwrap();
        assert_eq!(events.len(), 2);

        match &events[0] {
            DaemonEvent::Tick(snap) => assert_eq!(snap.ask, dec!(1.1001)),
            other => panic!("expected tick, got {:?}", other),
        }
        match &events[1] {
            DaemonEvent::BarClosed { bar, snapshot } => {
                assert_eq!(bar.close, dec!(1.1004));
                assert_eq!(snapshot.time_till_close_secs, None);
            }
            other => panic!("expected bar, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse("\n{\"type\":\"tick\"}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_publish_appends_shutdown() {
        let (bus, mut receiver) = EventBus::new(8);
        let events = parse(FEED).unwrap();

        let count = publish(events, bus).await.unwrap();
        assert_eq!(count, 2);

        assert_eq!(receiver.recv().await.map(|e| e.kind()), Some("tick"));
        assert_eq!(receiver.recv().await.map(|e| e.kind()), Some("bar_closed"));
        assert_eq!(receiver.recv().await, Some(DaemonEvent::Shutdown));
        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let path = std::env::temp_dir()
            .join(format!("warden-missing-{}.jsonl", uuid::Uuid::now_v7()));
        assert!(matches!(load(&path).await, Err(DaemonError::Io(_))));
    }
}
