use crate::models::HelperConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// File name of the helper configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "vcs-helper.yaml";

/// Prefix of environment variables overriding file settings,
/// e.g. `VCS_HELPER_GIT_PROGRAM` or `VCS_HELPER_LOG__DEBUG`.
pub const ENV_PREFIX: &str = "VCS_HELPER";

/// Name of the per-user directory below the platform config directory.
pub const APP_DIR_NAME: &str = "vcs-helper";

/// Per-user config directory, e.g. `$XDG_CONFIG_HOME/vcs-helper` (falling
/// back to `~/.config/vcs-helper`) on Linux.
///
/// Kept outside any working copy so the helper's own files never show up as
/// unversioned candidates.
pub fn default_config_dir() -> Option<Utf8PathBuf> {
    let dir = dirs::config_dir()?.join(APP_DIR_NAME);
    Utf8PathBuf::from_path_buf(dir).ok()
}

/// Loads and saves [`HelperConfig`].
///
/// Sources are layered in this order, later ones winning:
/// - built-in defaults
/// - `vcs-helper.yaml` in the config directory (optional)
/// - `VCS_HELPER_*` environment variables (`__` separates nested keys)
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Create a manager for `config_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
            env_prefix: ENV_PREFIX.to_string(),
        })
    }

    /// Use a different environment prefix. Mostly useful to isolate tests.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load the configuration.
    ///
    /// A missing file is not an error; defaults (plus any environment
    /// overrides) are returned instead.
    ///
    /// Loading usually happens before logging is set up, so the source is
    /// reported separately by [`ConfigManager::log_source`].
    pub fn load(&self) -> Result<HelperConfig> {
        let layered = Config::builder()
            .add_source(
                File::from(self.config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: HelperConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        Ok(config)
    }

    /// Log where `config` came from and its effective values.
    pub fn log_source(&self, config: &HelperConfig) {
        if self.config_path.exists() {
            tracing::info!("Loaded config from {}", self.config_path);
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }
        tracing::debug!("Effective config: {:?}", config);
    }

    /// Write `config` as YAML, replacing any existing file.
    pub fn save(&self, config: &HelperConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
