// UI module - presentation surface and foreground marshaling
//
// This module contains:
// - EventLoopBridge: carries worker notifications to the foreground context
// - Presenter: the surface an operation drives (busy / lines / done / error)
// - ConsolePresenter: terminal implementation used by the binary

pub mod bridge;
pub mod console;
pub mod presenter;

pub use bridge::{EventLoopBridge, EventLoopBridgeHandle, UiUpdate};
pub use console::ConsolePresenter;
pub use presenter::Presenter;
