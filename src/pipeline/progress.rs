//! Typed progress events for callers following a submission.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::state::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageEntered {
        index: usize,
        item: String,
        stage: Stage,
    },
    ItemCompleted {
        index: usize,
        item: String,
        outcome: String,
        /// Share of the batch processed so far; never decreases.
        percent: u8,
    },
    Committed {
        tag_id: String,
        file_count: usize,
    },
}

pub type ProgressReceiver = UnboundedReceiver<ProgressEvent>;

/// Sending half. A dropped receiver is not an error; events are discarded.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    sender: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.emit(ProgressEvent::StageEntered {
            index: 0,
            item: "a.png".to_string(),
            stage: Stage::Hashing,
        });
        sink.emit(ProgressEvent::Committed {
            tag_id: "t".to_string(),
            file_count: 1,
        });
        drop(sink);

        assert!(matches!(rx.recv().await, Some(ProgressEvent::StageEntered { .. })));
        assert!(matches!(rx.recv().await, Some(ProgressEvent::Committed { .. })));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (sink, rx) = ProgressSink::channel();
        drop(rx);
        sink.emit(ProgressEvent::Committed {
            tag_id: "t".to_string(),
            file_count: 1,
        });
        ProgressSink::disabled().emit(ProgressEvent::Committed {
            tag_id: "t".to_string(),
            file_count: 1,
        });
    }
}
