//! Background execution of one external capability.
//!
//! [`AsyncOperation::start`] runs a [`Capability`] off the foreground
//! context and returns an [`OperationHandle`]. Output lines go into the
//! shared [`ResultSink`]; the terminal [`Outcome`] is delivered exactly once
//! through a oneshot channel, after every line the worker appended.
//!
//! Two capability kinds exist:
//!
//! - [`Capability::Subprocess`]: spawned synchronously (so a missing program
//!   is reported from `start`), then streamed on a runtime task. Cancellation
//!   kills the child.
//! - [`Capability::Blocking`]: a [`BlockingCall`] run on the blocking pool.
//!   Cancellation is cooperative: the call observes it through its
//!   [`Notifier`] between notifications.

use crate::cancel::CancellationToken;
use crate::error::CapabilityError;
use crate::metrics::Metrics;
use crate::models::OperationState;
use crate::services::subprocess::{self, SubprocessSpec};
use crate::sink::{OutputLine, ResultSink};
use crate::ui::bridge::EventLoopBridgeHandle;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const WORKER_LOST: &str = "worker terminated unexpectedly";

/// Terminal result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// Carries a human readable message from the capability's error channel.
    Failed(String),
    Cancelled,
}

impl Outcome {
    pub fn state(&self) -> OperationState {
        match self {
            Outcome::Succeeded => OperationState::Succeeded,
            Outcome::Failed(_) => OperationState::Failed,
            Outcome::Cancelled => OperationState::Cancelled,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Why a [`BlockingCall`] stopped early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// A blocking library-style call that reports through a [`Notifier`].
pub trait BlockingCall: Send {
    fn run(self: Box<Self>, notifier: &Notifier) -> Result<(), CallError>;
}

impl<F> BlockingCall for F
where
    F: FnOnce(&Notifier) -> Result<(), CallError> + Send,
{
    fn run(self: Box<Self>, notifier: &Notifier) -> Result<(), CallError> {
        (*self)(notifier)
    }
}

/// The external action an operation performs.
pub enum Capability {
    Subprocess(SubprocessSpec),
    Blocking(Box<dyn BlockingCall>),
}

impl Capability {
    pub fn blocking(call: impl BlockingCall + 'static) -> Self {
        Capability::Blocking(Box::new(call))
    }

    /// A blocking capability from a closure.
    pub fn from_fn<F>(call: F) -> Self
    where
        F: FnOnce(&Notifier) -> Result<(), CallError> + Send + 'static,
    {
        Capability::Blocking(Box::new(call))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Subprocess(spec) => f.debug_tuple("Subprocess").field(spec).finish(),
            Capability::Blocking(_) => f.write_str("Blocking(..)"),
        }
    }
}

/// Handed to a [`BlockingCall`]: appends lines and exposes cancellation.
pub struct Notifier {
    sink: ResultSink,
    token: CancellationToken,
    updates: EventLoopBridgeHandle,
    metrics: Arc<Metrics>,
}

impl Notifier {
    /// Classify `text` and append it, unless cancellation was requested.
    pub fn emit(&self, text: impl Into<String>) -> Result<(), CallError> {
        self.checkpoint()?;
        self.sink.push(OutputLine::classified(text));
        self.metrics.record_line_appended();
        self.updates.lines_available();
        Ok(())
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), CallError> {
        if self.token.is_cancel_requested() {
            Err(CallError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancel_requested()
    }

    /// Report a non-terminal problem to the foreground.
    pub fn warn(&self, message: impl Into<String>) {
        self.updates.warn(message);
    }
}

/// Sends the outcome exactly once, even if the worker unwinds.
struct CompletionGuard {
    tx: Option<oneshot::Sender<Outcome>>,
    updates: EventLoopBridgeHandle,
    metrics: Arc<Metrics>,
}

impl CompletionGuard {
    fn new(
        tx: oneshot::Sender<Outcome>,
        updates: &EventLoopBridgeHandle,
        metrics: &Arc<Metrics>,
    ) -> Self {
        Self {
            tx: Some(tx),
            updates: updates.clone(),
            metrics: Arc::clone(metrics),
        }
    }

    fn complete(mut self, outcome: Outcome) {
        self.deliver(outcome);
    }

    fn deliver(&mut self, outcome: Outcome) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        tracing::info!("Operation finished: {}", outcome.state());
        self.metrics.record_outcome(&outcome);
        if tx.send(outcome).is_err() {
            tracing::debug!("Operation handle dropped before completion");
        }
        self.updates.finished();
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::error!("Operation worker exited without an outcome");
            self.deliver(Outcome::Failed(WORKER_LOST.to_string()));
        }
    }
}

/// Runs capabilities on a tokio runtime, feeding one sink and one token.
pub struct AsyncOperation {
    runtime: Handle,
    sink: ResultSink,
    token: CancellationToken,
    updates: EventLoopBridgeHandle,
    metrics: Arc<Metrics>,
}

impl AsyncOperation {
    pub fn new(
        runtime: Handle,
        sink: ResultSink,
        token: CancellationToken,
        updates: EventLoopBridgeHandle,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            runtime,
            sink,
            token,
            updates,
            metrics,
        }
    }

    /// Begin executing `capability` in the background.
    ///
    /// Returns [`CapabilityError::Launch`] synchronously when a subprocess
    /// cannot be spawned; no worker exists in that case.
    pub fn start(self, capability: Capability) -> Result<OperationHandle, CapabilityError> {
        let AsyncOperation {
            runtime,
            sink,
            token,
            updates,
            metrics,
        } = self;
        let (tx, completion) = oneshot::channel();

        let task = match capability {
            Capability::Subprocess(spec) => {
                let child = {
                    let _enter = runtime.enter();
                    spec.spawn().inspect_err(|e| tracing::error!("Launch failed: {}", e))?
                };

                let guard = CompletionGuard::new(tx, &updates, &metrics);
                runtime.spawn(async move {
                    let outcome = subprocess::drive(spec, child, sink, token, updates, metrics).await;
                    guard.complete(outcome);
                })
            }
            Capability::Blocking(call) => {
                let guard = CompletionGuard::new(tx, &updates, &metrics);
                let notifier = Notifier {
                    sink,
                    token: token.clone(),
                    updates,
                    metrics,
                };
                runtime.spawn_blocking(move || {
                    let result = call.run(&notifier);
                    guard.complete(blocking_outcome(result, &token));
                })
            }
        };

        Ok(OperationHandle { completion, task })
    }
}

/// A cancel request wins over whatever the call returned.
fn blocking_outcome(result: Result<(), CallError>, token: &CancellationToken) -> Outcome {
    if token.is_cancel_requested() {
        token.acknowledge();
        return Outcome::Cancelled;
    }

    match result {
        Ok(()) => Outcome::Succeeded,
        Err(CallError::Cancelled) => Outcome::Cancelled,
        Err(CallError::Failed(message)) => {
            tracing::error!("Blocking call failed: {}", message);
            Outcome::Failed(message)
        }
    }
}

/// Foreground handle to a started operation.
#[derive(Debug)]
pub struct OperationHandle {
    completion: oneshot::Receiver<Outcome>,
    task: JoinHandle<()>,
}

impl OperationHandle {
    /// The outcome, if the worker has delivered it.
    ///
    /// Returns `Some` at most once; afterwards the handle is spent.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        match self.completion.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => None,
        }
    }

    /// Wait for the outcome.
    pub async fn outcome(self) -> Outcome {
        self.completion
            .await
            .unwrap_or_else(|_| Outcome::Failed(WORKER_LOST.to_string()))
    }

    /// Whether the worker task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
