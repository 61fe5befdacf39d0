// Subversion capability through the `svn` command line client
//
// Status queries parse the fixed column layout of `svn status`:
//
//   col 0   item status      (' ' A C D I M R X ? ! ~)
//   col 1   property status  (' ' C M)
//   col 2-5 lock / history / switched / lock token
//   col 6   tree conflict    (' ' C)
//   col 7   blank, path from col 8
//
// With `-v` the path is preceded by working revision, last changed revision
// and author for versioned items.

use super::StatusQuery;
use super::properties::{PropertyEdit, PropertyStore};
use super::subprocess::{ExitPolicy, SubprocessSpec};
use crate::error::CapabilityError;
use crate::models::{HelperConfig, ItemStatus, StatusFlags, StatusRecord};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::sync::LazyLock;

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ ACDIMRX?!~])([ CM])[ L][ +][ SX][ KOTB]([ C]) (.+)$")
        .expect("Invalid svn status regex")
});

static VERBOSE_FIELDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\S+\s+\S+\s+\S+\s+(.+)$").expect("Invalid svn verbose regex"));

/// svn driven through its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvnCli {
    program: String,
    exit_policy: ExitPolicy,
    error_tail_lines: usize,
    line_buffer: usize,
    cwd: Option<Utf8PathBuf>,
}

impl SvnCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            exit_policy: ExitPolicy::strict(),
            error_tail_lines: 20,
            line_buffer: 256,
            cwd: None,
        }
    }

    /// svn reports every error with a non-zero code, so the configured
    /// success range only applies to git.
    pub fn from_config(config: &HelperConfig) -> Self {
        Self {
            error_tail_lines: config.error_tail_lines,
            line_buffer: config.line_buffer,
            ..Self::new(config.svn_program.clone())
        }
    }

    pub fn with_current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn command(&self, subcommand: &str) -> SubprocessSpec {
        SubprocessSpec::new(self.program.clone())
            .current_dir(self.cwd.as_deref())
            .exit_policy(self.exit_policy)
            .error_tail_lines(self.error_tail_lines)
            .line_buffer(self.line_buffer)
            .args([subcommand, "--non-interactive"])
    }

    /// `svn diff <paths>`.
    pub fn diff_spec(&self, paths: &[Utf8PathBuf]) -> SubprocessSpec {
        self.command("diff").args(targets(paths))
    }

    pub fn status_spec(&self, paths: &[Utf8PathBuf], flags: StatusFlags) -> SubprocessSpec {
        let depth = if flags.contains(StatusFlags::RECURSIVE) {
            "infinity"
        } else {
            "immediates"
        };

        let mut spec = self.command("status").args(["--depth", depth]);
        if flags.contains(StatusFlags::UNCHANGED) {
            spec = spec.arg("-v");
        }
        if flags.contains(StatusFlags::IGNORED) {
            spec = spec.arg("--no-ignore");
        }
        spec.args(targets(paths))
    }

    /// `propset`, or `propdel` for an edit without a value.
    pub fn propset_spec(&self, path: &Utf8Path, edit: &PropertyEdit) -> SubprocessSpec {
        let spec = match edit.value {
            Some(_) => self.command("propset"),
            None => self.command("propdel"),
        };
        let spec = spec.args(["--depth", edit.depth.as_str(), "--", edit.key.as_str()]);
        match &edit.value {
            Some(value) => spec.arg(value).arg(path.as_str()),
            None => spec.arg(path.as_str()),
        }
    }

    pub fn proplist_spec(&self, path: &Utf8Path) -> SubprocessSpec {
        self.command("proplist")
            .args(["-v", "--depth", "empty", "--"])
            .arg(path.as_str())
    }
}

impl Default for SvnCli {
    fn default() -> Self {
        Self::new("svn")
    }
}

/// No input paths means the current directory.
fn targets(paths: &[Utf8PathBuf]) -> Vec<String> {
    if paths.is_empty() {
        vec![".".to_string()]
    } else {
        paths.iter().map(|p| p.to_string()).collect()
    }
}

impl StatusQuery for SvnCli {
    fn status(
        &self,
        paths: &[Utf8PathBuf],
        flags: StatusFlags,
    ) -> Result<Vec<StatusRecord>, CapabilityError> {
        let output = self.status_spec(paths, flags).run_captured()?;
        Ok(parse_status(&output, flags.contains(StatusFlags::UNCHANGED)))
    }
}

impl PropertyStore for SvnCli {
    fn set_property(&self, path: &Utf8Path, edit: &PropertyEdit) -> Result<(), CapabilityError> {
        self.propset_spec(path, edit).run_captured()?;
        Ok(())
    }

    fn list_properties(&self, path: &Utf8Path) -> Result<Vec<(String, String)>, CapabilityError> {
        let output = self.proplist_spec(path).run_captured()?;
        Ok(parse_proplist(&output))
    }
}

/// Parse `svn status` output; lines that are not status rows are skipped.
pub fn parse_status(output: &str, verbose: bool) -> Vec<StatusRecord> {
    output
        .lines()
        .filter_map(|line| {
            let record = parse_status_line(line, verbose);
            if record.is_none() && !line.trim().is_empty() {
                tracing::trace!("Skipping svn status line: {}", line);
            }
            record
        })
        .collect()
}

fn parse_status_line(line: &str, verbose: bool) -> Option<StatusRecord> {
    let caps = STATUS_LINE.captures(line)?;
    let item = caps[1].chars().next()?;
    let prop = caps[2].chars().next()?;
    let tree_conflict = &caps[3] == "C";
    let rest = &caps[4];

    let versioned = !matches!(item, '?' | 'I');
    let path = if verbose && versioned {
        VERBOSE_FIELDS.captures(rest)?.get(1)?.as_str()
    } else {
        rest.trim_start()
    };

    let mut text_status = match item {
        ' ' => ItemStatus::Normal,
        'A' => ItemStatus::Added,
        'C' => ItemStatus::Conflicted,
        'D' => ItemStatus::Deleted,
        'I' => ItemStatus::Ignored,
        'M' => ItemStatus::Modified,
        'R' => ItemStatus::Replaced,
        'X' => ItemStatus::External,
        '?' => ItemStatus::Unversioned,
        '!' => ItemStatus::Missing,
        '~' => ItemStatus::Obstructed,
        _ => ItemStatus::None,
    };
    if tree_conflict {
        text_status = ItemStatus::Conflicted;
    }

    let prop_status = match prop {
        'M' => ItemStatus::Modified,
        'C' => ItemStatus::Conflicted,
        _ => ItemStatus::None,
    };

    Some(StatusRecord {
        path: Utf8PathBuf::from(path),
        text_status,
        prop_status,
        versioned,
    })
}

/// Parse `svn proplist -v` output into ordered (key, value) pairs.
///
/// Keys are indented two spaces, value lines four.
pub fn parse_proplist(output: &str) -> Vec<(String, String)> {
    let mut properties: Vec<(String, String)> = Vec::new();

    for line in output.lines() {
        if let Some(value) = line.strip_prefix("    ") {
            if let Some((_, current)) = properties.last_mut() {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(value);
            }
        } else if let Some(key) = line.strip_prefix("  ") {
            properties.push((key.trim().to_string(), String::new()));
        }
    }

    properties
}
