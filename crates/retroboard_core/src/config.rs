//! Engine configuration.
//!
//! # Responsibility
//! - Load engine settings from TOML with environment overrides.
//! - Validate settings before any session or logger uses them.
//!
//! # Invariants
//! - Missing keys fall back to defaults; unknown keys are rejected.
//! - Environment overrides win over file values.

use crate::logging::{default_log_level, normalize_level};
use crate::model::board::BucketTemplate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_LOG_LEVEL: &str = "RETROBOARD_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "RETROBOARD_LOG_DIR";

const DEFAULT_SUBSCRIPTION_BUFFER: usize = 64;
const DEFAULT_RESUBSCRIBE_DELAY_MS: u64 = 250;

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(details) => write!(f, "invalid config: {details}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    /// Capacity of the channel between subscription tasks and the mirror.
    pub subscription_buffer: usize,
    /// Pause before a failed note subscription is opened again.
    pub resubscribe_delay_ms: u64,
    /// Buckets created by `create_board_from_template`.
    pub default_buckets: Vec<BucketTemplate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
            resubscribe_delay_ms: DEFAULT_RESUBSCRIBE_DELAY_MS,
            default_buckets: BucketTemplate::defaults(),
        }
    }
}

impl EngineConfig {
    /// Parses TOML text without applying environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, keyed by `ENV_*` names.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        self.validate()?;
        Ok(self)
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        if self.subscription_buffer == 0 {
            return Err(ConfigError::Invalid(
                "subscription_buffer must be greater than zero".to_string(),
            ));
        }
        if self.resubscribe_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "resubscribe_delay_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(template) = self
            .default_buckets
            .iter()
            .find(|template| template.name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "default bucket name must not be blank (kind `{}`)",
                template.kind
            )));
        }
        Ok(())
    }
}

/// Loads configuration from `path` and applies environment overrides.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    EngineConfig::from_toml_str(&text)?.with_env_overrides()
}
