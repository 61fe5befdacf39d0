use crate::models::OperationKind;
use crate::sink::OutputLine;

/// The presentation surface an operation drives.
///
/// All methods are called on the foreground context only. A GUI toolkit
/// implements this with its dialogs; the binary uses
/// [`ConsolePresenter`](crate::ui::console::ConsolePresenter).
#[cfg_attr(test, mockall::automock)]
pub trait Presenter {
    /// Show the busy surface, optionally with a cancel affordance.
    fn show_busy(&mut self, kind: OperationKind, cancelable: bool);

    /// Render one line of output.
    fn append_line(&mut self, line: &OutputLine);

    /// Drop previously rendered output (before a refresh).
    fn clear_output(&mut self);

    /// The operation succeeded; the surface becomes closable and, for
    /// diff/properties, refreshable.
    fn show_done(&mut self, closable: bool, refreshable: bool);

    /// The operation failed, or could not be launched.
    fn show_error(&mut self, message: &str);

    /// A non-terminal problem, the operation continues.
    fn show_warning(&mut self, message: &str);

    /// The operation was cancelled; return to the idle surface.
    fn show_idle(&mut self);
}
