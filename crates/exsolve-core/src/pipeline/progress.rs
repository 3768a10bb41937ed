//! Progress notifications emitted while a run is in flight.
//!
//! Purely observational: nothing in the pipeline waits on a sink.

use tokio::sync::mpsc;

/// Receives human-readable status lines and per-item completions.
pub trait ProgressSink: Send + Sync {
    fn on_status(&self, _message: &str) {}

    fn on_item_done(&self, _index: usize) {}
}

/// Discards every notification.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Logs status lines through `tracing`.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_status(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn on_item_done(&self, index: usize) {
        tracing::debug!("Item {index} done");
    }
}

/// A notification forwarded by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Status(String),
    ItemDone(usize),
}

/// Forwards notifications into an unbounded channel.
///
/// Send errors are ignored: a consumer that went away simply stops watching.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn on_status(&self, message: &str) {
        let _ = self.tx.send(ProgressEvent::Status(message.to_string()));
    }

    fn on_item_done(&self, index: usize) {
        let _ = self.tx.send(ProgressEvent::ItemDone(index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_progress_forwards_in_order() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.on_status("Starting");
        sink.on_item_done(3);

        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Status("Starting".into()));
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::ItemDone(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_progress_survives_dropped_receiver() {
        let (sink, rx) = ChannelProgress::new();
        drop(rx);
        sink.on_status("nobody listening");
        sink.on_item_done(0);
    }
}
