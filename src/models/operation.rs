use crate::error::OperationError;
use crate::operation::Outcome;
use camino::Utf8PathBuf;
use std::fmt;
use std::time::{Duration, Instant};

/// The user-facing action an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Add,
    Diff,
    Properties,
}

impl OperationKind {
    /// Diff and properties keep their output on screen and can be re-run.
    pub fn is_refreshable(self) -> bool {
        matches!(self, OperationKind::Diff | OperationKind::Properties)
    }

    /// Human readable title used by presenters.
    pub fn title(self) -> &'static str {
        match self {
            OperationKind::Add => "Add",
            OperationKind::Diff => "Diff",
            OperationKind::Properties => "Properties",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Add => "add",
            OperationKind::Diff => "diff",
            OperationKind::Properties => "properties",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of an [`Operation`].
///
/// `Created -> Running -> {Succeeded | Failed | Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Created,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Succeeded | OperationState::Failed | OperationState::Cancelled
        )
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Created => "created",
            OperationState::Running => "running",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
            OperationState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One long-running external action and its lifecycle.
///
/// The target set is fixed at construction and never exposed mutably, so it
/// cannot change once the operation is running.
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OperationKind,
    targets: Vec<Utf8PathBuf>,
    state: OperationState,
    started_at: Option<Instant>,
    finished_after: Option<Duration>,
}

impl Operation {
    /// Create an operation in the `Created` state.
    ///
    /// Fails with [`OperationError::EmptyTargets`] when `targets` is empty.
    pub fn new(kind: OperationKind, targets: Vec<Utf8PathBuf>) -> Result<Self, OperationError> {
        if targets.is_empty() {
            return Err(OperationError::EmptyTargets);
        }

        Ok(Self {
            kind,
            targets,
            state: OperationState::Created,
            started_at: None,
            finished_after: None,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn targets(&self) -> &[Utf8PathBuf] {
        &self.targets
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Wall time between `start` and the terminal transition.
    pub fn duration(&self) -> Option<Duration> {
        self.finished_after
    }

    /// `Created -> Running`.
    pub fn start(&mut self) -> Result<(), OperationError> {
        self.transition(OperationState::Running)?;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// `Running -> terminal`, chosen by the outcome.
    pub fn finish(&mut self, outcome: &Outcome) -> Result<(), OperationError> {
        self.transition(outcome.state())?;
        self.finished_after = self.started_at.map(|start| start.elapsed());
        Ok(())
    }

    fn transition(&mut self, to: OperationState) -> Result<(), OperationError> {
        let allowed = match (self.state, to) {
            (OperationState::Created, OperationState::Running) => true,
            (OperationState::Running, next) => next.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(OperationError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        tracing::debug!("{} operation: {} -> {}", self.kind, self.state, to);
        self.state = to;
        Ok(())
    }
}
