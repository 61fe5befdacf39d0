// EventLoopBridge - Marshals worker notifications onto the foreground context
//
// Background workers never touch the presenter. They push small `UiUpdate`
// messages through a bounded channel; whoever owns the presenter (the GUI
// main loop, or the console loop of the binary) drains the channel and
// performs all rendering itself.
//
// Line payloads are not carried by the channel: they live in the ResultSink
// and the foreground reads them by cursor. A dropped `LinesAvailable` nudge
// therefore never loses output.

use crate::metrics::Metrics;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Messages sent from a worker to the foreground context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    /// New lines were appended to the operation's sink.
    LinesAvailable,

    /// A non-terminal problem worth showing (e.g. a failed property edit).
    Warning(String),

    /// The worker delivered its terminal outcome.
    Finished,
}

/// Receiving end owned by the foreground context.
pub struct EventLoopBridge {
    ui_update_rx: mpsc::Receiver<UiUpdate>,
    ui_update_tx: mpsc::Sender<UiUpdate>,
    metrics: Arc<Metrics>,
}

impl EventLoopBridge {
    /// Create a bridge with a bounded queue of `capacity` updates.
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        let (ui_update_tx, ui_update_rx) = mpsc::channel(capacity.max(1));
        Self {
            ui_update_rx,
            ui_update_tx,
            metrics,
        }
    }

    /// Cloneable sending handle for workers.
    pub fn clone_handle(&self) -> EventLoopBridgeHandle {
        EventLoopBridgeHandle {
            ui_update_tx: self.ui_update_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Next queued update without waiting.
    pub fn try_next(&mut self) -> Option<UiUpdate> {
        self.ui_update_rx.try_recv().ok()
    }

    /// Wait for the next update, blocking the current thread.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_next(&mut self) -> Option<UiUpdate> {
        self.ui_update_rx.blocking_recv()
    }

    /// Wait for the next update.
    pub async fn next(&mut self) -> Option<UiUpdate> {
        self.ui_update_rx.recv().await
    }
}

/// Sending half of the bridge, handed to background workers.
#[derive(Clone)]
pub struct EventLoopBridgeHandle {
    ui_update_tx: mpsc::Sender<UiUpdate>,
    metrics: Arc<Metrics>,
}

impl EventLoopBridgeHandle {
    /// Queue an update without blocking.
    ///
    /// When the queue is full the update is skipped; the foreground is busy
    /// draining earlier updates and will re-read the sink anyway.
    pub fn update_ui(&self, update: UiUpdate) {
        match self.ui_update_tx.try_send(update) {
            Ok(()) => self.metrics.record_ui_update(),
            Err(mpsc::error::TrySendError::Full(update)) => {
                self.metrics.record_ui_channel_full();
                tracing::warn!("UI update channel full - skipping {:?}", update);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Failed to send UI update - foreground has stopped");
            }
        }
    }

    pub fn lines_available(&self) {
        self.update_ui(UiUpdate::LinesAvailable);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.update_ui(UiUpdate::Warning(message.into()));
    }

    pub fn finished(&self) {
        self.update_ui(UiUpdate::Finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[test]
    fn test_updates_arrive_in_order() {
        let mut bridge = EventLoopBridge::new(8, Arc::new(Metrics::new()));
        let handle = bridge.clone_handle();

        handle.lines_available();
        handle.warn("careful");
        handle.finished();

        assert_eq!(bridge.try_next(), Some(UiUpdate::LinesAvailable));
        assert_eq!(bridge.try_next(), Some(UiUpdate::Warning("careful".into())));
        assert_eq!(bridge.try_next(), Some(UiUpdate::Finished));
        assert_eq!(bridge.try_next(), None);
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let metrics = Arc::new(Metrics::new());
        let mut bridge = EventLoopBridge::new(1, Arc::clone(&metrics));
        let handle = bridge.clone_handle();

        handle.lines_available();
        handle.lines_available();

        assert_eq!(metrics.ui_updates.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.ui_update_channel_full.load(Ordering::Relaxed), 1);
        assert_eq!(bridge.try_next(), Some(UiUpdate::LinesAvailable));
        assert_eq!(bridge.try_next(), None);
    }

    #[test]
    fn test_blocking_next_from_other_thread() {
        let mut bridge = EventLoopBridge::new(4, Arc::new(Metrics::new()));
        let handle = bridge.clone_handle();

        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            handle.finished();
        });

        assert_eq!(bridge.blocking_next(), Some(UiUpdate::Finished));
        sender.join().unwrap();
    }

    #[tokio::test]
    async fn test_async_next_from_task() {
        let mut bridge = EventLoopBridge::new(4, Arc::new(Metrics::new()));
        let handle = bridge.clone_handle();

        tokio::spawn(async move {
            handle.warn("from task");
        });

        let update = tokio::time::timeout(Duration::from_secs(1), bridge.next())
            .await
            .unwrap();
        assert_eq!(update, Some(UiUpdate::Warning("from task".into())));
    }
}
