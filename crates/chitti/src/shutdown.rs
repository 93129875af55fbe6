//! Cancellation for the continuous run loop.

use std::sync::Arc;

use tokio::sync::watch;

/// A handle to stop a running perception loop.
///
/// This is a lightweight, cloneable handle: signal handlers hold one clone,
/// the loop holds another. The loop checks [`should_stop`](Self::should_stop)
/// between cycles and awaits [`stopped`](Self::stopped) during the
/// inter-cycle delay, so a stop never interrupts a cycle mid-step.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    /// Create a new stop handle.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Signal the loop to stop.
    pub fn stop(&self) {
        self.signal.send_replace(true);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        *self.signal.borrow()
    }

    /// Wait until the stop signal is sent. Returns immediately if it already was.
    pub async fn stopped(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives in `self`, so the channel can't close while we wait.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
