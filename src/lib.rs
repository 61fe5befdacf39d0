// vcs-helper - background git/Subversion actions for file manager context menus
//
// This is the library crate containing the operation machinery and the
// git/Subversion capabilities. The binary crate (main.rs) provides the
// console front end.

pub mod cancel;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod operation;
pub mod services;
pub mod sink;
pub mod ui;

// Re-export commonly used types for convenience
pub use cancel::{CancelState, CancellationToken};
pub use config::ConfigManager;
pub use controller::{
    Begin, CapabilityFactory, ControllerEvent, OperationController, OperationRequest, UserIntent,
};
pub use error::{CapabilityError, ControllerError, OperationError};
pub use metrics::Metrics;
pub use models::{FileSelection, HelperConfig, OperationKind, OperationState, StatusFlags};
pub use operation::{AsyncOperation, BlockingCall, CallError, Capability, Notifier, Outcome};
pub use sink::{OutputLine, ResultSink};
pub use ui::{ConsolePresenter, EventLoopBridge, Presenter, UiUpdate};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
