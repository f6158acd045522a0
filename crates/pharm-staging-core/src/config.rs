//! Pipeline configuration, loaded from a TOML file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::PublishMode;
use crate::export::WriteMode;
use crate::scd::InsertPolicy;

/// Default date pattern: `M/d/yyyy`, month and day may be unpadded.
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Default location of the staging database, relative to the config file.
pub const DEFAULT_STAGING_DB: &str = "staging/patients.db";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid date format '{0}'")]
    InvalidDateFormat(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A validated chrono `strftime`-style date pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateFormat(String);

impl DateFormat {
    /// Validate a chrono format string.
    pub fn new(pattern: impl Into<String>) -> ConfigResult<Self> {
        let pattern = pattern.into();
        let invalid = pattern.is_empty()
            || StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error));
        if invalid {
            return Err(ConfigError::InvalidDateFormat(pattern));
        }
        Ok(Self(pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self(DEFAULT_DATE_FORMAT.to_string())
    }
}

impl TryFrom<String> for DateFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> ConfigResult<Self> {
        Self::new(value)
    }
}

impl From<DateFormat> for String {
    fn from(format: DateFormat) -> Self {
        format.0
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where each source file is read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceLocations {
    pub transactions: PathBuf,
    pub insurance: PathBuf,
    pub medications: PathBuf,
    pub patients: PathBuf,
}

/// Where each output dataset is written to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputLocations {
    pub transactions: PathBuf,
    pub insurance: PathBuf,
    pub medications: PathBuf,
    pub patients: PathBuf,
    #[serde(default)]
    pub write_mode: WriteMode,
}

/// Merge behavior for the patient dimension.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeConfig {
    #[serde(default)]
    pub insert_policy: InsertPolicy,
    #[serde(default)]
    pub publish: PublishMode,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default = "default_staging_db")]
    pub staging_db: PathBuf,
    pub sources: SourceLocations,
    pub outputs: OutputLocations,
    #[serde(default)]
    pub merge: MergeConfig,
}

fn default_staging_db() -> PathBuf {
    PathBuf::from(DEFAULT_STAGING_DB)
}

impl PipelineConfig {
    /// Load a config file. Relative paths inside it are resolved against
    /// the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml_str(&content, base_dir)
    }

    /// Parse config text, resolving relative paths against `base_dir`.
    pub fn from_toml_str(content: &str, base_dir: &Path) -> ConfigResult<Self> {
        let mut config: PipelineConfig = toml::from_str(content)?;
        config.resolve_paths(base_dir);
        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };

        resolve(&mut self.staging_db);
        resolve(&mut self.sources.transactions);
        resolve(&mut self.sources.insurance);
        resolve(&mut self.sources.medications);
        resolve(&mut self.sources.patients);
        resolve(&mut self.outputs.transactions);
        resolve(&mut self.outputs.insurance);
        resolve(&mut self.outputs.medications);
        resolve(&mut self.outputs.patients);
    }
}
