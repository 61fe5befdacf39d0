// CancellationToken - per-operation cooperative cancellation flag
//
// Backed by a tokio watch channel so the worker can either poll
// `is_cancel_requested()` between notifications or await `cancelled()` inside
// a `tokio::select!` while a subprocess is running.

use std::sync::Arc;
use tokio::sync::watch;

/// Tri-state cancellation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    Unset,
    CancelRequested,
    /// The worker observed the request and terminated.
    Acknowledged,
}

/// Cancellation flag shared by one controller and one worker.
///
/// Clones observe the same flag. A restarted operation gets a fresh token
/// from [`CancellationToken::reset`] so old and new operations never signal
/// each other.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<CancelState>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CancelState::Unset);
        Self {
            state: Arc::new(state),
        }
    }

    /// Request cancellation. Returns `true` only for the first request.
    pub fn request_cancel(&self) -> bool {
        let requested = self.state.send_if_modified(|state| {
            if *state == CancelState::Unset {
                *state = CancelState::CancelRequested;
                true
            } else {
                false
            }
        });

        if requested {
            tracing::info!("Cancellation requested");
        }
        requested
    }

    /// Non-blocking check, true once cancellation was requested.
    pub fn is_cancel_requested(&self) -> bool {
        *self.state.borrow() != CancelState::Unset
    }

    pub fn state(&self) -> CancelState {
        *self.state.borrow()
    }

    /// A fresh, unset token.
    pub fn reset(&self) -> Self {
        Self::new()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        if rx.wait_for(|state| *state != CancelState::Unset).await.is_err() {
            // Unreachable while `self` holds the sender.
            std::future::pending::<()>().await;
        }
    }

    /// Mark the request as observed; no-op unless a request is pending.
    pub(crate) fn acknowledge(&self) {
        self.state.send_if_modified(|state| {
            if *state == CancelState::CancelRequested {
                *state = CancelState::Acknowledged;
                true
            } else {
                false
            }
        });
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
