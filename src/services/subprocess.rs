// Subprocess capability - spawn an external program and stream its output
//
// Two ways to run a `SubprocessSpec`:
// - `spawn` + `drive`: the streaming path used by operations. stdout (and
//   optionally stderr) lines are classified into the ResultSink as they
//   arrive; cancellation kills the child.
// - `run_captured`: a blocking run collecting all output, used by status
//   queries and property stores that parse the result as a whole.

use crate::cancel::CancellationToken;
use crate::error::CapabilityError;
use crate::metrics::Metrics;
use crate::operation::Outcome;
use crate::sink::{OutputLine, ResultSink};
use crate::ui::bridge::EventLoopBridgeHandle;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::VecDeque;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which exit codes count as success.
///
/// git add reports some recoverable problems with exit code 1, so the add
/// helper accepts `0..=1`; other callers can be strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitPolicy {
    pub max_success_code: i32,
}

impl ExitPolicy {
    pub fn new(max_success_code: i32) -> Self {
        Self { max_success_code }
    }

    /// Only exit code 0 is success.
    pub fn strict() -> Self {
        Self::new(0)
    }

    pub fn accepts(&self, code: i32) -> bool {
        (0..=self.max_success_code).contains(&code)
    }
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Program plus argument vector, and how to treat its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<Utf8PathBuf>,
    /// Append stderr lines to the sink as well as stdout.
    pub merge_stderr: bool,
    pub exit_policy: ExitPolicy,
    /// Trailing stderr lines kept for the failure message.
    pub error_tail_lines: usize,
    /// Capacity of the reader -> worker line channel.
    pub line_buffer: usize,
}

impl SubprocessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            merge_stderr: false,
            exit_policy: ExitPolicy::default(),
            error_tail_lines: 20,
            line_buffer: 256,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: Option<&Utf8Path>) -> Self {
        self.cwd = dir.map(Utf8Path::to_path_buf);
        self
    }

    pub fn merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }

    pub fn exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    pub fn error_tail_lines(mut self, lines: usize) -> Self {
        self.error_tail_lines = lines;
        self
    }

    pub fn line_buffer(mut self, capacity: usize) -> Self {
        self.line_buffer = capacity;
        self
    }

    /// Spawn the child with piped stdout/stderr.
    ///
    /// Must be called within a tokio runtime context. An error here is a
    /// launch failure: the program could not be started at all.
    pub fn spawn(&self) -> Result<Child, CapabilityError> {
        tracing::debug!("Spawning: {}", self);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        cmd.spawn().map_err(|source| CapabilityError::Launch {
            program: self.program.clone(),
            source,
        })
    }

    /// Run to completion on the calling thread and return stdout.
    ///
    /// An exit code outside the policy becomes
    /// [`CapabilityError::CommandFailed`] carrying the trimmed stderr.
    pub fn run_captured(&self) -> Result<String, CapabilityError> {
        tracing::debug!("Running: {}", self);

        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| CapabilityError::Launch {
            program: self.program.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(code) if self.exit_policy.accepts(code) => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Some(code) => Err(CapabilityError::CommandFailed {
                program: self.program.clone(),
                code,
                stderr,
            }),
            None => Err(CapabilityError::CommandFailed {
                program: self.program.clone(),
                code: -1,
                stderr: if stderr.is_empty() {
                    "terminated by signal".to_string()
                } else {
                    stderr
                },
            }),
        }
    }
}

impl fmt::Display for SubprocessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

enum StreamLine {
    Stdout(String),
    Stderr(String),
}

/// Stream a spawned child into `sink` until it exits or `token` fires.
pub(crate) async fn drive(
    spec: SubprocessSpec,
    mut child: Child,
    sink: ResultSink,
    token: CancellationToken,
    updates: EventLoopBridgeHandle,
    metrics: Arc<Metrics>,
) -> Outcome {
    let (tx, mut rx) = mpsc::channel(spec.line_buffer.max(1));
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, tx.clone(), StreamLine::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, tx.clone(), StreamLine::Stderr));
    }
    drop(tx);

    let mut tail = VecDeque::with_capacity(spec.error_tail_lines);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                return terminate(&spec, &mut child, &readers, &token).await;
            }
            line = rx.recv() => match line {
                Some(StreamLine::Stdout(text)) => {
                    append(&sink, &updates, &metrics, text);
                }
                Some(StreamLine::Stderr(text)) => {
                    if spec.error_tail_lines > 0 {
                        if tail.len() == spec.error_tail_lines {
                            tail.pop_front();
                        }
                        tail.push_back(text.clone());
                    }
                    if spec.merge_stderr {
                        append(&sink, &updates, &metrics, text);
                    }
                }
                None => break,
            }
        }
    }

    let status = tokio::select! {
        biased;
        _ = token.cancelled() => {
            return terminate(&spec, &mut child, &readers, &token).await;
        }
        status = child.wait() => status,
    };

    match status {
        Ok(status) => match status.code() {
            Some(code) if spec.exit_policy.accepts(code) => {
                tracing::info!("{} exited with code {}", spec.program, code);
                Outcome::Succeeded
            }
            Some(code) => {
                let stderr = Vec::from(tail).join("\n");
                tracing::error!("{} exited with code {}", spec.program, code);
                if stderr.is_empty() {
                    Outcome::Failed(format!("{} exited with code {}", spec.program, code))
                } else {
                    Outcome::Failed(stderr)
                }
            }
            None => {
                tracing::error!("{} was terminated by a signal", spec.program);
                Outcome::Failed(format!("{} was terminated by a signal", spec.program))
            }
        },
        Err(e) => {
            tracing::error!("Failed to wait for {}: {}", spec.program, e);
            Outcome::Failed(format!("Failed to wait for {}: {}", spec.program, e))
        }
    }
}

fn append(sink: &ResultSink, updates: &EventLoopBridgeHandle, metrics: &Metrics, text: String) {
    sink.push(OutputLine::classified(text));
    metrics.record_line_appended();
    updates.lines_available();
}

async fn terminate(
    spec: &SubprocessSpec,
    child: &mut Child,
    readers: &[JoinHandle<()>],
    token: &CancellationToken,
) -> Outcome {
    tracing::warn!("Cancelling {}", spec.program);

    if let Err(e) = child.start_kill() {
        tracing::debug!("Kill of {} failed (already exited?): {}", spec.program, e);
    }
    // Grandchildren may still hold the pipes open.
    for reader in readers {
        reader.abort();
    }
    if let Err(e) = child.wait().await {
        tracing::debug!("Failed to reap {}: {}", spec.program, e);
    }

    token.acknowledge();
    Outcome::Cancelled
}

fn spawn_reader<R>(
    stream: R,
    tx: mpsc::Sender<StreamLine>,
    wrap: fn(String) -> StreamLine,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(wrap(decode_line(&buf))).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Stream read failed: {}", e);
                    break;
                }
            }
        }
        tracing::debug!("Stream reached EOF");
    })
}

/// Lossy UTF-8 decode without the line terminator.
fn decode_line(raw: &[u8]) -> String {
    let trimmed = raw
        .strip_suffix(b"\n")
        .map(|rest| rest.strip_suffix(b"\r").unwrap_or(rest))
        .unwrap_or(raw);
    String::from_utf8_lossy(trimmed).into_owned()
}
