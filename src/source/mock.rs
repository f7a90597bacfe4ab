//! Mock record source for testing.
//!
//! Each call to `stream_from` consumes the next scripted [`MockSession`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::{Record, RecordResult, RecordSource, RecordStream, SourceError};
use crate::position::Position;

enum Step {
    Emit(RecordResult),
    Sleep(Duration),
}

/// Scripted contents of one streaming session.
#[derive(Default)]
pub struct MockSession {
    steps: Vec<Step>,
    hold_open: bool,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a record.
    pub fn record(mut self, position: Position, payload: impl Into<bytes::Bytes>) -> Self {
        self.steps
            .push(Step::Emit(Ok(Record::new(position, payload))));
        self
    }

    /// Emit a terminal source error.
    pub fn error(mut self, error: SourceError) -> Self {
        self.steps.push(Step::Emit(Err(error)));
        self
    }

    /// Pause before the next step.
    pub fn sleep(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Sleep(duration));
        self
    }

    /// Keep the stream open after the script until cancelled.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// Mock source replaying scripted sessions.
#[derive(Default)]
pub struct MockRecordSource {
    sessions: Mutex<VecDeque<MockSession>>,
    opened_from: Mutex<Vec<Position>>,
    cancelled: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl MockRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source with a single scripted session.
    pub fn with_session(session: MockSession) -> Self {
        Self::with_sessions(vec![session])
    }

    pub fn with_sessions(sessions: Vec<MockSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            ..Default::default()
        }
    }

    /// Positions passed to each `stream_from` call.
    pub async fn opened_from(&self) -> Vec<Position> {
        self.opened_from.lock().await.clone()
    }

    /// Number of workers that stopped because of cancellation.
    pub fn cancelled_workers(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Number of workers that have exited, for any reason.
    pub fn finished_workers(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for MockRecordSource {
    async fn stream_from(
        &self,
        cancel: CancellationToken,
        from: Position,
    ) -> Result<RecordStream, SourceError> {
        self.opened_from.lock().await.push(from);
        let session = self
            .sessions
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| SourceError::Open {
                from,
                reason: "no scripted session left".to_string(),
            })?;

        let (tx, records) = mpsc::channel(16);
        let cancelled = Arc::clone(&self.cancelled);
        let finished = Arc::clone(&self.finished);

        let worker = tokio::spawn(async move {
            if !replay(session, tx, &cancel).await {
                cancelled.fetch_add(1, Ordering::SeqCst);
            }
            finished.fetch_add(1, Ordering::SeqCst);
        });

        Ok(RecordStream { records, worker })
    }
}

/// Returns false if the replay stopped because of cancellation.
async fn replay(
    session: MockSession,
    tx: mpsc::Sender<RecordResult>,
    cancel: &CancellationToken,
) -> bool {
    for step in session.steps {
        match step {
            Step::Sleep(duration) => {
                tokio::select! {
                    _ = cancel.cancelled() => return false,
                    _ = tokio::time::sleep(duration) => {}
                }
            }
            Step::Emit(item) => {
                tokio::select! {
                    _ = cancel.cancelled() => return false,
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            return true;
                        }
                    }
                }
            }
        }
    }

    if session.hold_open {
        cancel.cancelled().await;
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_script_then_closes() {
        let source = MockRecordSource::with_session(
            MockSession::new()
                .record(Position::new(1, 0), &b"a"[..])
                .record(Position::new(2, 0), &b"b"[..]),
        );

        let RecordStream {
            mut records,
            worker,
        } = source
            .stream_from(CancellationToken::new(), Position::ZERO)
            .await
            .unwrap();

        assert_eq!(records.recv().await.unwrap().unwrap().position, Position::new(1, 0));
        assert_eq!(records.recv().await.unwrap().unwrap().position, Position::new(2, 0));
        assert!(records.recv().await.is_none());
        worker.await.unwrap();
        assert_eq!(source.finished_workers(), 1);
        assert_eq!(source.cancelled_workers(), 0);
    }

    #[tokio::test]
    async fn test_hold_open_waits_for_cancel() {
        let source = MockRecordSource::with_session(MockSession::new().hold_open());
        let cancel = CancellationToken::new();
        let stream = source
            .stream_from(cancel.clone(), Position::ZERO)
            .await
            .unwrap();

        cancel.cancel();
        stream.worker.await.unwrap();
        assert_eq!(source.cancelled_workers(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_script_fails_to_open() {
        let source = MockRecordSource::new();
        let result = source
            .stream_from(CancellationToken::new(), Position::new(4, 0))
            .await;
        assert!(matches!(result, Err(SourceError::Open { .. })));
        assert_eq!(source.opened_from().await, vec![Position::new(4, 0)]);
    }
}
