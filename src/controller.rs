// Operation Controller - binds one operation's lifecycle to a presenter
//
// The controller lives on the foreground context. It:
// - builds a capability through its CapabilityFactory and starts it
// - owns the one optional live operation (a second start is rejected)
// - drains the EventLoopBridge and forwards new sink lines to the presenter
// - flips the presenter between busy / done / error / idle on the outcome
//
// Nothing here ever blocks on the worker except `wait_blocking`, which a
// console front end uses as its event loop.

use crate::cancel::CancellationToken;
use crate::error::{CapabilityError, ControllerError};
use crate::metrics::Metrics;
use crate::models::{HelperConfig, Operation, OperationKind, OperationState};
use crate::operation::{AsyncOperation, Capability, OperationHandle, Outcome};
use crate::services::properties::PropertyEdit;
use crate::sink::ResultSink;
use crate::ui::bridge::{EventLoopBridge, UiUpdate};
use crate::ui::presenter::Presenter;
use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// Input for one capability build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub targets: Vec<Utf8PathBuf>,
    /// Property change to apply before listing (properties only).
    pub edit: Option<PropertyEdit>,
}

impl OperationRequest {
    pub fn new(targets: Vec<Utf8PathBuf>) -> Self {
        Self {
            targets,
            edit: None,
        }
    }

    pub fn with_edit(mut self, edit: PropertyEdit) -> Self {
        self.edit = Some(edit);
        self
    }
}

/// Turns a request into a runnable capability for one kind of operation.
#[cfg_attr(test, mockall::automock)]
pub trait CapabilityFactory: Send {
    fn kind(&self) -> OperationKind;

    fn build(&self, request: &OperationRequest) -> Result<Capability, CapabilityError>;
}

/// Inbound events from the presentation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    Cancel,
    Refresh,
    SelectionConfirmed(Vec<Utf8PathBuf>),
    SetProperty(PropertyEdit),
    DeleteProperty(String),
}

/// Lifecycle events for observers other than the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Started {
        kind: OperationKind,
        targets: usize,
    },
    CancelRequested,
    Finished {
        kind: OperationKind,
        state: OperationState,
    },
    LaunchFailed {
        kind: OperationKind,
        message: String,
    },
}

/// Result of [`OperationController::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    Started,
    /// No targets were given; nothing was created or shown.
    NothingSelected,
}

/// Drives one user-facing action at a time.
pub struct OperationController<P: Presenter> {
    presenter: P,
    factory: Box<dyn CapabilityFactory>,
    runtime: Handle,
    bridge: EventLoopBridge,
    sink: ResultSink,
    /// Number of sink lines already handed to the presenter.
    cursor: usize,
    token: CancellationToken,
    current: Option<Operation>,
    handle: Option<OperationHandle>,
    events: broadcast::Sender<ControllerEvent>,
    metrics: Arc<Metrics>,
}

impl<P: Presenter> OperationController<P> {
    pub fn new(
        presenter: P,
        factory: Box<dyn CapabilityFactory>,
        runtime: Handle,
        config: &HelperConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            presenter,
            factory,
            runtime,
            bridge: EventLoopBridge::new(config.ui_queue_capacity, Arc::clone(&metrics)),
            sink: ResultSink::new(),
            cursor: 0,
            token: CancellationToken::new(),
            current: None,
            handle: None,
            events,
            metrics,
        }
    }

    /// Start an operation over `targets`.
    ///
    /// Empty `targets` abort quietly with [`Begin::NothingSelected`]. A
    /// capability that cannot be launched is shown through
    /// [`Presenter::show_error`] and returned as [`ControllerError::Launch`];
    /// no operation exists afterwards.
    pub fn begin(&mut self, targets: Vec<Utf8PathBuf>) -> Result<Begin, ControllerError> {
        self.start(OperationRequest::new(targets))
    }

    /// Like [`begin`](Self::begin), with a fully built request.
    pub fn begin_with(&mut self, request: OperationRequest) -> Result<Begin, ControllerError> {
        self.start(request)
    }

    /// Request cancellation of the live operation.
    ///
    /// The presenter stays busy until the outcome arrives. Returns `false`
    /// when nothing is running or cancel was already requested.
    pub fn cancel(&mut self) -> bool {
        if !self.is_busy() {
            tracing::debug!("Cancel ignored - no live operation");
            return false;
        }

        let first = self.token.request_cancel();
        if first {
            let _ = self.events.send(ControllerEvent::CancelRequested);
        }
        first
    }

    /// Re-run a finished diff or properties operation with the same targets.
    pub fn refresh(&mut self) -> Result<Begin, ControllerError> {
        let targets = self.restartable(OperationKind::is_refreshable)?;
        self.start(OperationRequest::new(targets))
    }

    /// Apply a property change and re-list (properties operations only).
    pub fn apply_edit(&mut self, edit: PropertyEdit) -> Result<Begin, ControllerError> {
        if self.factory.kind() != OperationKind::Properties {
            return Err(ControllerError::Unsupported {
                kind: self.factory.kind(),
                action: "property editing",
            });
        }

        let targets = self.restartable(|kind| kind == OperationKind::Properties)?;
        self.start(OperationRequest::new(targets).with_edit(edit))
    }

    pub fn handle_intent(&mut self, intent: UserIntent) -> Result<(), ControllerError> {
        tracing::debug!("User intent: {:?}", intent);
        match intent {
            UserIntent::Cancel => {
                self.cancel();
                Ok(())
            }
            UserIntent::Refresh => self.refresh().map(drop),
            UserIntent::SelectionConfirmed(paths) => self.begin(paths).map(drop),
            UserIntent::SetProperty(edit) => self.apply_edit(edit).map(drop),
            UserIntent::DeleteProperty(key) => self.apply_edit(PropertyEdit::delete(key)).map(drop),
        }
    }

    /// Process everything the worker has reported so far, without waiting.
    ///
    /// Returns the terminal state when the operation finished during this
    /// call.
    pub fn pump(&mut self) -> Option<OperationState> {
        while let Some(update) = self.bridge.try_next() {
            self.apply_update(update);
        }
        self.flush_lines();
        self.poll_completion()
    }

    /// Run the foreground loop on this thread until the live operation ends.
    ///
    /// Must not be called from within the tokio runtime.
    pub fn wait_blocking(&mut self) -> Option<OperationState> {
        loop {
            if let Some(state) = self.pump() {
                return Some(state);
            }
            if !self.is_busy() {
                return None;
            }
            match self.bridge.blocking_next() {
                Some(update) => self.apply_update(update),
                None => return None,
            }
        }
    }

    /// Async counterpart of [`wait_blocking`](Self::wait_blocking).
    pub async fn wait(&mut self) -> Option<OperationState> {
        loop {
            if let Some(state) = self.pump() {
                return Some(state);
            }
            if !self.is_busy() {
                return None;
            }
            match self.bridge.next().await {
                Some(update) => self.apply_update(update),
                None => return None,
            }
        }
    }

    /// Whether an operation is running.
    pub fn is_busy(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|op| !op.state().is_terminal())
    }

    pub fn state(&self) -> Option<OperationState> {
        self.current.as_ref().map(Operation::state)
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.current.as_ref()
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    /// Token of the current (or next) operation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Targets of the terminal operation, if `allowed` accepts its kind.
    fn restartable(
        &self,
        allowed: impl Fn(OperationKind) -> bool,
    ) -> Result<Vec<Utf8PathBuf>, ControllerError> {
        let op = self
            .current
            .as_ref()
            .filter(|op| op.state().is_terminal())
            .ok_or(ControllerError::NotTerminal)?;

        if !allowed(op.kind()) {
            return Err(ControllerError::NotRefreshable(op.kind()));
        }
        Ok(op.targets().to_vec())
    }

    fn start(&mut self, request: OperationRequest) -> Result<Begin, ControllerError> {
        let kind = self.factory.kind();

        if request.targets.is_empty() {
            tracing::info!("No {} targets selected - nothing to do", kind);
            return Ok(Begin::NothingSelected);
        }
        if self.is_busy() {
            tracing::warn!("Rejected {} start - an operation is already running", kind);
            return Err(ControllerError::Busy);
        }

        let mut operation = Operation::new(kind, request.targets.clone())?;

        // A previous operation is terminal here, so its producer is gone.
        if self.current.is_some() {
            self.sink.clear();
            self.cursor = 0;
            self.token = self.token.reset();
            self.presenter.clear_output();
        }

        let worker = AsyncOperation::new(
            self.runtime.clone(),
            self.sink.clone(),
            self.token.clone(),
            self.bridge.clone_handle(),
            Arc::clone(&self.metrics),
        );
        let started = self
            .factory
            .build(&request)
            .and_then(|capability| worker.start(capability));
        let handle = match started {
            Ok(handle) => handle,
            Err(e) => return Err(self.launch_failed(kind, e)),
        };

        operation.start()?;
        tracing::info!(
            "Started {} operation on {} target(s)",
            kind,
            operation.targets().len()
        );
        self.metrics.record_operation_started();
        let _ = self.events.send(ControllerEvent::Started {
            kind,
            targets: operation.targets().len(),
        });

        self.presenter.show_busy(kind, true);
        self.current = Some(operation);
        self.handle = Some(handle);
        Ok(Begin::Started)
    }

    fn launch_failed(&mut self, kind: OperationKind, error: CapabilityError) -> ControllerError {
        tracing::error!("Failed to launch {} operation: {}", kind, error);
        self.metrics.record_launch_failure();

        let message = error.to_string();
        self.presenter.show_error(&message);
        let _ = self.events.send(ControllerEvent::LaunchFailed { kind, message });
        ControllerError::Launch(error)
    }

    fn apply_update(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::LinesAvailable | UiUpdate::Finished => self.flush_lines(),
            UiUpdate::Warning(message) => {
                self.flush_lines();
                self.presenter.show_warning(&message);
            }
        }
    }

    fn flush_lines(&mut self) {
        let lines = self.sink.snapshot(self.cursor);
        self.cursor += lines.len();
        for line in &lines {
            self.presenter.append_line(line);
        }
    }

    fn poll_completion(&mut self) -> Option<OperationState> {
        let outcome = self.handle.as_mut()?.try_outcome()?;
        self.handle = None;

        // Every line appended before the outcome is visible now.
        self.flush_lines();

        let op = self.current.as_mut()?;
        if let Err(e) = op.finish(&outcome) {
            tracing::error!("Operation state error: {}", e);
        }
        let kind = op.kind();
        let state = op.state();

        match &outcome {
            Outcome::Succeeded => self.presenter.show_done(true, kind.is_refreshable()),
            Outcome::Failed(message) => self.presenter.show_error(message),
            Outcome::Cancelled => self.presenter.show_idle(),
        }
        let _ = self.events.send(ControllerEvent::Finished { kind, state });

        Some(state)
    }
}
