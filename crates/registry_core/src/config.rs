//! Registry configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe every tunable of the registry engines in one typed value.
//! - Validate settings before any engine is constructed.
//!
//! # Invariants
//! - Every section is optional and falls back to documented defaults.
//! - A loaded config always names a supported home numbering plan.

use crate::model::attendance::ServiceSchedule;
use crate::phone::{NumberingPlan, PhoneNormalizer};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE_FILE: &str = "registry.sqlite3";
const DEFAULT_RECENT_WINDOW_DAYS: u32 = 30;

/// Configuration load or validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "cannot read config `{}`: {message}", path.display())
            }
            Self::Parse(message) => write!(f, "config parse error: {message}"),
            Self::Invalid(message) => write!(f, "config validation error: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// SQLite database file. Relative paths resolve against the working dir.
    pub database_path: PathBuf,
    pub phone: PhoneConfig,
    pub logging: LoggingConfig,
    pub statistics: StatisticsConfig,
    pub schedule: ServiceSchedule,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            phone: PhoneConfig::default(),
            logging: LoggingConfig::default(),
            statistics: StatisticsConfig::default(),
            schedule: ServiceSchedule::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    /// ISO 3166 region of the home numbering plan.
    pub region: String,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            region: "UG".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when absent.
    pub level: Option<String>,
    /// Absolute directory for rolling log files; logging stays off when absent.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Members created within this many days count as recent registrations.
    pub recent_window_days: u32,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
        }
    }
}

impl RegistryConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.numbering_plan()?;

        if self.statistics.recent_window_days == 0 {
            return Err(ConfigError::Invalid(
                "statistics.recent_window_days must be positive".to_string(),
            ));
        }

        for window in &self.schedule.windows {
            if window.start >= window.end {
                return Err(ConfigError::Invalid(format!(
                    "schedule window for slot {} must end after it starts",
                    window.slot.code()
                )));
            }
        }

        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    pub fn numbering_plan(&self) -> Result<NumberingPlan, ConfigError> {
        NumberingPlan::for_region(&self.phone.region).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unsupported phone.region `{}`; supported: UG",
                self.phone.region
            ))
        })
    }

    pub fn phone_normalizer(&self) -> Result<PhoneNormalizer, ConfigError> {
        Ok(PhoneNormalizer::new(self.numbering_plan()?))
    }
}
