//! Newline-delimited JSON record source.
//!
//! Each line carries one record:
//! ```text
//! {"position":"1700000000.1","payload":"<base64>"}
//! ```
//!
//! The reader is reopened for every session, so a file-backed source replays
//! from the start and skips records before the requested position. A source
//! over a reader that cannot be reopened (stdin, a pipe) must be marked
//! [`JsonLinesSource::one_shot`]: it opens once and reports itself as not
//! replayable.
//!
//! Positions must strictly increase from line to line. A repeated or
//! decreasing position ends the stream as malformed input.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Record, RecordResult, RecordSource, RecordStream, SourceError, DEFAULT_CHANNEL_CAPACITY};
use crate::position::Position;

/// Line format of the JSON-lines source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRecord {
    pub position: Position,
    /// Base64-encoded payload.
    pub payload: String,
}

impl WireRecord {
    /// Encode a record as a single JSON line (without trailing newline).
    pub fn encode(record: &Record) -> serde_json::Result<String> {
        let wire = WireRecord {
            position: record.position,
            payload: STANDARD.encode(&record.payload),
        };
        serde_json::to_string(&wire)
    }

    fn decode(line: &str, line_no: usize) -> RecordResult {
        let malformed = |reason: String| SourceError::Malformed {
            line: line_no,
            reason,
        };
        let wire: WireRecord = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
        let payload = STANDARD
            .decode(wire.payload.as_bytes())
            .map_err(|e| malformed(e.to_string()))?;
        Ok(Record::new(wire.position, payload))
    }
}

/// Record source reading JSON lines from a reader opened per session.
pub struct JsonLinesSource<F> {
    open: F,
    capacity: usize,
    one_shot: bool,
    opened: AtomicBool,
}

impl<F, R> JsonLinesSource<F>
where
    F: Fn() -> io::Result<R> + Send + Sync,
    R: AsyncRead + Send + Unpin + 'static,
{
    /// Create a source from a reader factory.
    pub fn new(open: F) -> Self {
        Self {
            open,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            one_shot: false,
            opened: AtomicBool::new(false),
        }
    }

    /// Open the reader at most once. Later sessions fail with
    /// [`SourceError::Open`] instead of continuing mid-stream.
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Set the record channel capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

#[async_trait]
impl<F, R> RecordSource for JsonLinesSource<F>
where
    F: Fn() -> io::Result<R> + Send + Sync,
    R: AsyncRead + Send + Unpin + 'static,
{
    async fn stream_from(
        &self,
        cancel: CancellationToken,
        from: Position,
    ) -> Result<RecordStream, SourceError> {
        if self.one_shot && self.opened.swap(true, Ordering::SeqCst) {
            return Err(SourceError::Open {
                from,
                reason: "input cannot be reopened".to_string(),
            });
        }
        let reader = (self.open)().map_err(|e| SourceError::Open {
            from,
            reason: e.to_string(),
        })?;
        let (tx, records) = mpsc::channel(self.capacity);

        info!(from = %from, "Opening JSON-lines record stream");
        let worker = tokio::spawn(produce(reader, from, tx, cancel));

        Ok(RecordStream { records, worker })
    }

    fn replayable(&self) -> bool {
        !self.one_shot
    }
}

async fn produce<R>(
    reader: R,
    from: Position,
    tx: mpsc::Sender<RecordResult>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut line_no = 0;
    let mut last: Option<Position> = None;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Record stream cancelled");
                return;
            }
            next = lines.next_line() => next,
        };
        line_no += 1;

        let item = match next {
            Ok(None) => {
                debug!(lines = line_no - 1, "Record stream reached end of input");
                return;
            }
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => WireRecord::decode(&line, line_no),
            Err(e) => Err(SourceError::Fetch(e.to_string())),
        };

        let item = match (item, last) {
            (Ok(record), Some(prev)) if record.position <= prev => Err(SourceError::Malformed {
                line: line_no,
                reason: format!("position {} does not advance past {prev}", record.position),
            }),
            (item, _) => item,
        };
        if let Ok(record) = &item {
            last = Some(record.position);
            if record.position < from {
                continue;
            }
        }
        let terminal = item.is_err();

        tokio::select! {
            _ = cancel.cancelled() => return,
            sent = tx.send(item) => {
                if sent.is_err() {
                    // Consumer went away.
                    return;
                }
            }
        }

        if terminal {
            return;
        }
    }
}
