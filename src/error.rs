//! Library error taxonomy.
//!
//! - [`CapabilityError`]: an external program or library call could not be
//!   started or returned a failure before any operation existed.
//! - [`OperationError`]: illegal use of the [`Operation`](crate::models::Operation)
//!   state machine.
//! - [`ControllerError`]: a user intent the
//!   [`OperationController`](crate::controller::OperationController) refused.
//!
//! Runtime failures of a started operation are not errors at this level; they
//! arrive as [`Outcome::Failed`](crate::operation::Outcome::Failed).

use crate::models::{OperationKind, OperationState};
use thiserror::Error;

/// Errors raised by external capabilities (git, svn, property stores).
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    CommandFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to parse output: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the operation lifecycle state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("an operation needs at least one target path")]
    EmptyTargets,

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: OperationState,
        to: OperationState,
    },
}

/// Errors returned by the operation controller for rejected intents.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("an operation is already running")]
    Busy,

    #[error("the operation has not reached a terminal state")]
    NotTerminal,

    #[error("{0} operations cannot be refreshed")]
    NotRefreshable(OperationKind),

    #[error("{action} is not supported for {kind} operations")]
    Unsupported {
        kind: OperationKind,
        action: &'static str,
    },

    #[error(transparent)]
    Launch(#[from] CapabilityError),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_names_program() {
        let err = CapabilityError::Launch {
            program: "git".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "failed to launch git: not found");
    }

    #[test]
    fn test_controller_error_wraps_launch() {
        let err: ControllerError = CapabilityError::Parse("bad line".to_string()).into();
        assert!(matches!(err, ControllerError::Launch(_)));
        assert_eq!(err.to_string(), "failed to parse output: bad line");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = OperationError::InvalidTransition {
            from: OperationState::Created,
            to: OperationState::Succeeded,
        };
        assert_eq!(err.to_string(), "invalid transition from created to succeeded");
    }

    #[test]
    fn test_not_refreshable_message() {
        let err = ControllerError::NotRefreshable(OperationKind::Add);
        assert_eq!(err.to_string(), "add operations cannot be refreshed");
    }
}
