use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    Explicit,
    FrameCap,
    Battery,
}

/// Notifications emitted by the recording controller. Consumers (a UI shell,
/// tests) subscribe through the bus; emission never blocks and lagging
/// receivers only lose their own backlog.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RecordingEvent {
    FrameCaptured {
        session_id: String,
        frame_id: String,
        frame_count: usize,
        bytes: usize,
    },
    SessionPaused {
        session_id: String,
        reason: PauseReason,
    },
    SessionResumed {
        session_id: String,
    },
    SessionCompleted {
        session_id: String,
        frame_count: usize,
    },
    BatteryWarning {
        session_id: String,
        level: f64,
    },
    ProcessingProgress {
        session_id: String,
        progress: f64,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecordingEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget; an event with no subscribers is dropped.
    pub fn emit(&self, event: RecordingEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
