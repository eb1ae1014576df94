//! Engine event types and broadcast bus
//!
//! Named events emitted by the pipeline for any connected UI. The bus is
//! transport-agnostic; the HTTP server forwards it over WebSocket.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the reorganization engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ProcessingStart {
        filename: String,
    },
    FileAdded {
        file_id: i64,
        filename: String,
    },
    FileModified {
        file_id: i64,
        filename: String,
    },
    FileRemoved {
        file_id: i64,
        filename: String,
    },
    ReclusteringStart,
    ReclusteringEnd {
        cluster_count: usize,
        files_moved: usize,
    },
    ScanStart {
        root: String,
    },
    ScanComplete {
        file_count: usize,
    },
}

/// Broadcast bus for engine events.
///
/// Sends never block the engine: with no subscribers the event is
/// dropped, and a lagging subscriber loses old events rather than
/// applying backpressure.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
