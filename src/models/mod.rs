//! Data models shared by the services, the controller and presenters.
//!
//! - [`Operation`]: one external action with its frozen target set and
//!   lifecycle state machine
//! - [`FileSelection`]: status-query rows the user edits before an operation starts
//! - [`HelperConfig`]: settings loaded by [`ConfigManager`](crate::config::ConfigManager)

pub mod config;
pub mod operation;
pub mod selection;

pub use config::{HelperConfig, LogSettings};
pub use operation::{Operation, OperationKind, OperationState};
pub use selection::{
    FileSelection, ItemStatus, SelectionEntry, SelectionNode, StatusFlags, StatusRecord,
};
