// ConsolePresenter - terminal rendering of an operation
//
// Output lines go to `out` (stdout for the binary), status and errors go to
// `err` (stderr) so piping a diff keeps only the diff.

use crate::models::OperationKind;
use crate::services::classifier::LineCategory;
use crate::sink::OutputLine;
use crate::ui::presenter::Presenter;
use std::io::{self, Stderr, Stdout, Write};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Presenter writing to a pair of text streams.
pub struct ConsolePresenter<O: Write, E: Write> {
    out: O,
    err: E,
    color: bool,
}

impl ConsolePresenter<Stdout, Stderr> {
    /// Presenter on the process stdout/stderr.
    pub fn stdio(color: bool) -> Self {
        Self::new(io::stdout(), io::stderr(), color)
    }
}

impl<O: Write, E: Write> ConsolePresenter<O, E> {
    pub fn new(out: O, err: E, color: bool) -> Self {
        Self { out, err, color }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    fn paint(&self, style: &str, text: &str) -> String {
        if self.color {
            format!("{style}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn status(&mut self, text: String) {
        if let Err(e) = writeln!(self.err, "{}", text).and_then(|_| self.err.flush()) {
            tracing::warn!("Failed to write status: {}", e);
        }
    }
}

impl<O: Write, E: Write> Presenter for ConsolePresenter<O, E> {
    fn show_busy(&mut self, kind: OperationKind, cancelable: bool) {
        let hint = if cancelable { " (Ctrl-C to cancel)" } else { "" };
        let text = format!("{}...{}", kind.title(), hint);
        self.status(text);
    }

    fn append_line(&mut self, line: &OutputLine) {
        let text = match line.category() {
            LineCategory::Added => self.paint(GREEN, line.text()),
            LineCategory::Removed => self.paint(RED, line.text()),
            LineCategory::Heading => self.paint(BOLD, line.text()),
            LineCategory::Plain => line.text().to_string(),
        };
        if let Err(e) = writeln!(self.out, "{}", text) {
            tracing::warn!("Failed to write output line: {}", e);
        }
    }

    fn clear_output(&mut self) {
        // Lines already written to a terminal stay there.
        tracing::trace!("clear_output on console presenter");
    }

    fn show_done(&mut self, _closable: bool, refreshable: bool) {
        if let Err(e) = self.out.flush() {
            tracing::warn!("Failed to flush output: {}", e);
        }
        let text = if refreshable {
            "Done (run again to refresh)."
        } else {
            "Done."
        };
        self.status(text.to_string());
    }

    fn show_error(&mut self, message: &str) {
        let text = format!("{} {}", self.paint(RED, "error:"), message);
        self.status(text);
    }

    fn show_warning(&mut self, message: &str) {
        let text = format!("{} {}", self.paint(YELLOW, "warning:"), message);
        self.status(text);
    }

    fn show_idle(&mut self) {
        self.status("Cancelled.".to_string());
    }
}
