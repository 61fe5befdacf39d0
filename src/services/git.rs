use super::StatusQuery;
use super::subprocess::{ExitPolicy, SubprocessSpec};
use crate::controller::{CapabilityFactory, OperationRequest};
use crate::error::CapabilityError;
use crate::models::{HelperConfig, ItemStatus, OperationKind, StatusFlags, StatusRecord};
use crate::operation::Capability;
use camino::{Utf8Path, Utf8PathBuf};

/// git driven through its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCli {
    program: String,
    exit_policy: ExitPolicy,
    error_tail_lines: usize,
    line_buffer: usize,
    cwd: Option<Utf8PathBuf>,
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            exit_policy: ExitPolicy::default(),
            error_tail_lines: 20,
            line_buffer: 256,
            cwd: None,
        }
    }

    pub fn from_config(config: &HelperConfig) -> Self {
        Self {
            program: config.git_program.clone(),
            exit_policy: ExitPolicy::new(config.max_success_exit_code),
            error_tail_lines: config.error_tail_lines,
            line_buffer: config.line_buffer,
            cwd: None,
        }
    }

    /// Run every command inside `dir` instead of the process directory.
    pub fn with_current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn command(&self) -> SubprocessSpec {
        SubprocessSpec::new(self.program.clone())
            .current_dir(self.cwd.as_deref())
            .exit_policy(self.exit_policy)
            .error_tail_lines(self.error_tail_lines)
            .line_buffer(self.line_buffer)
    }

    /// `git add -- <paths>`; stderr is part of the visible output.
    pub fn add_spec(&self, paths: &[Utf8PathBuf]) -> SubprocessSpec {
        self.command()
            .arg("add")
            .arg("--")
            .args(paths.iter().map(|p| p.as_str()))
            .merge_stderr(true)
    }

    /// `git diff --no-color -- <paths>`.
    pub fn diff_spec(&self, paths: &[Utf8PathBuf]) -> SubprocessSpec {
        self.command()
            .args(["diff", "--no-color", "--"])
            .args(paths.iter().map(|p| p.as_str()))
    }

    /// `git rev-parse --show-toplevel`.
    pub fn toplevel_spec(&self) -> SubprocessSpec {
        self.command()
            .args(["rev-parse", "--show-toplevel"])
            .exit_policy(ExitPolicy::strict())
    }

    /// Root of the working tree containing the current directory.
    pub fn toplevel(&self) -> Result<Utf8PathBuf, CapabilityError> {
        let output = self.toplevel_spec().run_captured()?;
        let root = output.trim_end_matches(['\r', '\n']);
        if root.is_empty() {
            return Err(CapabilityError::Parse(
                "git rev-parse printed no working tree root".to_string(),
            ));
        }
        Ok(Utf8PathBuf::from(root))
    }

    /// Same git, running at the working tree root.
    ///
    /// Porcelain status paths are relative to the root, so commands taking
    /// them (`add`) have to run there too.
    pub fn at_toplevel(&self) -> Result<Self, CapabilityError> {
        let root = self.toplevel()?;
        tracing::debug!("git working tree root: {}", root);
        Ok(self.clone().with_current_dir(root))
    }

    /// `git status --porcelain=v1 -z ...` for the given flags.
    pub fn status_spec(&self, paths: &[Utf8PathBuf], flags: StatusFlags) -> SubprocessSpec {
        let untracked = if !flags.contains(StatusFlags::UNVERSIONED) {
            "--untracked-files=no"
        } else if flags.contains(StatusFlags::RECURSIVE) {
            "--untracked-files=all"
        } else {
            "--untracked-files=normal"
        };

        let mut spec = self
            .command()
            .args(["status", "--porcelain=v1", "-z", untracked])
            .exit_policy(ExitPolicy::strict());
        if flags.contains(StatusFlags::IGNORED) {
            spec = spec.arg("--ignored");
        }
        if !paths.is_empty() {
            spec = spec.arg("--").args(paths.iter().map(|p| p.as_str()));
        }
        spec
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl StatusQuery for GitCli {
    fn status(
        &self,
        paths: &[Utf8PathBuf],
        flags: StatusFlags,
    ) -> Result<Vec<StatusRecord>, CapabilityError> {
        let output = self.status_spec(paths, flags).run_captured()?;
        parse_porcelain(&output)
    }
}

/// Parse `git status --porcelain=v1 -z` output.
///
/// Entries are NUL separated `XY path`; renames and copies are followed by
/// an extra entry holding the original path.
pub fn parse_porcelain(output: &str) -> Result<Vec<StatusRecord>, CapabilityError> {
    let mut records = Vec::new();
    let mut fields = output.split('\0').filter(|field| !field.is_empty());

    while let Some(entry) = fields.next() {
        let mut chars = entry.chars();
        let (Some(x), Some(y), Some(' ')) = (chars.next(), chars.next(), chars.next()) else {
            return Err(CapabilityError::Parse(format!(
                "unexpected git status entry: {entry:?}"
            )));
        };
        let path = chars.as_str();
        if path.is_empty() {
            return Err(CapabilityError::Parse(format!(
                "git status entry without a path: {entry:?}"
            )));
        }

        if matches!(x, 'R' | 'C') {
            // Original path of a rename/copy; only the new path is listed.
            fields.next();
        }

        records.push(record_from_codes(x, y, Utf8Path::new(path)));
    }

    Ok(records)
}

fn record_from_codes(x: char, y: char, path: &Utf8Path) -> StatusRecord {
    let (text_status, versioned) = match (x, y) {
        ('?', '?') => (ItemStatus::Unversioned, false),
        ('!', '!') => (ItemStatus::Ignored, false),
        ('U', _) | (_, 'U') | ('A', 'A') | ('D', 'D') => (ItemStatus::Conflicted, true),
        // Staged adds, deletes, renames and copies outrank later worktree edits.
        (index @ ('A' | 'D' | 'R' | 'C'), _) => (letter_status(index), true),
        (index, ' ') => (letter_status(index), true),
        (_, worktree) => (letter_status(worktree), true),
    };

    StatusRecord {
        path: path.to_path_buf(),
        text_status,
        prop_status: ItemStatus::None,
        versioned,
    }
}

fn letter_status(letter: char) -> ItemStatus {
    match letter {
        'M' | 'T' => ItemStatus::Modified,
        'A' | 'C' => ItemStatus::Added,
        'D' => ItemStatus::Deleted,
        'R' => ItemStatus::Replaced,
        ' ' => ItemStatus::Normal,
        _ => ItemStatus::None,
    }
}

/// Builds `git add` operations.
#[derive(Debug, Clone)]
pub struct AddFactory {
    git: GitCli,
}

impl AddFactory {
    pub fn new(git: GitCli) -> Self {
        Self { git }
    }
}

impl CapabilityFactory for AddFactory {
    fn kind(&self) -> OperationKind {
        OperationKind::Add
    }

    fn build(&self, request: &OperationRequest) -> Result<Capability, CapabilityError> {
        Ok(Capability::Subprocess(self.git.add_spec(&request.targets)))
    }
}
