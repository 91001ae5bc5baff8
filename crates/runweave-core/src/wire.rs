// Event wire
//
// An ordered, single-writer multi-clone in-process channel of typed events.
// The producer closes the wire when the run is done; the reader then drains
// the remaining buffered events and terminates. Writing after close is a
// programmer error and returns `CoreError::WireClosed`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use runweave_contracts::StepEvent;

use crate::error::{CoreError, Result};

/// Default event buffer size for a run's wire
pub const DEFAULT_WIRE_CAPACITY: usize = 256;

/// Create a connected wire and reader with the given buffer capacity.
/// A full buffer blocks the producer until the reader catches up.
pub fn wire(capacity: usize) -> (Wire, WireReader) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Wire {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        WireReader { rx },
    )
}

/// Writing half of the event channel. Clones share the same underlying
/// sender, so `close` on any clone closes the wire for all of them.
#[derive(Debug, Clone)]
pub struct Wire {
    tx: Arc<Mutex<Option<mpsc::Sender<StepEvent>>>>,
}

impl Wire {
    /// Write one event. Awaits when the buffer is full; errors after close
    /// or when the reader has gone away.
    pub async fn write(&self, event: StepEvent) -> Result<()> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx.send(event).await.map_err(|_| CoreError::WireClosed),
            None => Err(CoreError::WireClosed),
        }
    }

    /// Close the wire. Pending reads terminate after the last written event
    /// is delivered. Idempotent.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// Reading half of the event channel
#[derive(Debug)]
pub struct WireReader {
    rx: mpsc::Receiver<StepEvent>,
}

impl WireReader {
    /// Receive the next event; `None` once the wire is closed and drained
    pub async fn recv(&mut self) -> Option<StepEvent> {
        self.rx.recv().await
    }

    /// Convert into a `Stream` of events
    pub fn into_stream(self) -> ReceiverStream<StepEvent> {
        ReceiverStream::new(self.rx)
    }

    /// Drain every remaining event until close
    pub async fn collect(mut self) -> Vec<StepEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use runweave_contracts::{EventPayload, RunCancelledData};
    use uuid::Uuid;

    fn event(n: u64) -> StepEvent {
        StepEvent {
            run_id: Uuid::nil(),
            parent_run_id: None,
            depth: 0,
            local_sequence: n,
            ts: Utc::now(),
            step_id: None,
            branch_id: None,
            payload: EventPayload::RunCancelled {
                data: RunCancelledData { reason: None },
            },
        }
    }

    #[tokio::test]
    async fn events_read_in_write_order() {
        let (wire, reader) = wire(8);
        for n in 1..=5 {
            wire.write(event(n)).await.unwrap();
        }
        wire.close();
        let events = reader.collect().await;
        let sequences: Vec<u64> = events.iter().map(|e| e.local_sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn close_terminates_reader_after_drain() {
        let (wire, mut reader) = wire(8);
        wire.write(event(1)).await.unwrap();
        wire.close();
        assert!(reader.recv().await.is_some());
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn write_after_close_errors() {
        let (wire, _reader) = wire(8);
        wire.close();
        wire.close();
        let err = wire.write(event(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::WireClosed));
    }

    #[tokio::test]
    async fn clones_share_close() {
        let (wire, _reader) = wire(8);
        let clone = wire.clone();
        wire.close();
        assert!(clone.is_closed());
    }
}
