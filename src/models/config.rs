use crate::models::selection::StatusFlags;
use serde::{Deserialize, Serialize};

/// Helper configuration loaded from `vcs-helper.yaml`.
///
/// Every field has a default so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Program used for git actions.
    pub git_program: String,

    /// Program used for Subversion actions.
    pub svn_program: String,

    /// Highest subprocess exit code still treated as success.
    pub max_success_exit_code: i32,

    /// Number of trailing stderr lines kept for failure messages.
    pub error_tail_lines: usize,

    /// Capacity of the foreground update queue.
    pub ui_queue_capacity: usize,

    /// Capacity of the channel between stream readers and the worker.
    pub line_buffer: usize,

    /// Status query flags used to pre-populate file selections.
    pub status: StatusFlags,

    pub log: LogSettings,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
            svn_program: "svn".to_string(),
            max_success_exit_code: 1,
            error_tail_lines: 20,
            ui_queue_capacity: 100,
            line_buffer: 256,
            status: StatusFlags::MODIFIED | StatusFlags::UNVERSIONED,
            log: LogSettings::default(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub dir: String,
    pub prefix: String,
    pub debug: bool,
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            prefix: "vcs-helper".to_string(),
            debug: false,
            console: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HelperConfig::default();
        assert_eq!(config.git_program, "git");
        assert_eq!(config.svn_program, "svn");
        assert_eq!(config.max_success_exit_code, 1);
        assert!(config.status.contains(StatusFlags::MODIFIED));
        assert!(config.status.contains(StatusFlags::UNVERSIONED));
        assert!(!config.status.contains(StatusFlags::RECURSIVE));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: HelperConfig =
            serde_yaml_ng::from_str("git_program: /usr/local/bin/git\nlog:\n  debug: true\n")
                .unwrap();

        assert_eq!(config.git_program, "/usr/local/bin/git");
        assert_eq!(config.svn_program, "svn");
        assert!(config.log.debug);
        assert_eq!(config.log.prefix, "vcs-helper");
    }
}
