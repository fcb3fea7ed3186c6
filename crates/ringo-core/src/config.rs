//! Engine settings read from `ringo.toml` and `RINGO_*` variables.
//!
//! Layers, lowest first: built-in defaults, the TOML file, then environment
//! variables such as `RINGO_EXECUTION__PARALLEL=true`. Execution settings can
//! still be replaced at runtime through `TableContext::set_execution`.
//!
//! ```toml
//! [execution]
//! parallel = true
//! min_parallel_rows = 50000
//!
//! [loader]
//! delimiter = ","
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Failure to read or validate a [`RingoConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The sources could not be merged into a config.
    #[error("Cannot read configuration: {0}")]
    ParseError(String),

    /// A setting holds an unusable value.
    #[error("Bad value for '{key}': {message}")]
    InvalidValue {
        /// Dotted key, e.g. `loader.delimiter`.
        key: String,
        /// What is wrong with the value.
        message: String,
    },
}

fn invalid(key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    }
}

/// `[execution]`: data-parallel mode and sort tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Run grouping, sorting and edge materialization on rayon workers.
    pub parallel: bool,
    /// Chunks per rayon worker.
    pub chunks_per_thread: usize,
    /// Sort partitions this small are insertion-sorted.
    pub insertion_sort_threshold: usize,
    /// Smaller inputs stay serial.
    pub min_parallel_rows: usize,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            parallel: false,
            chunks_per_thread: 10,
            insertion_sort_threshold: 20,
            min_parallel_rows: 10_000,
        }
    }
}

/// `[loader]`: defaults for delimited-text loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    /// Field separator.
    pub delimiter: char,
    /// First line names the columns.
    pub has_header: bool,
    /// Drop unparsable lines with a warning.
    pub skip_bad_lines: bool,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            has_header: true,
            skip_bad_lines: false,
        }
    }
}

/// `[logging]`: level handed to whatever subscriber the host installs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// One of `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// All engine settings. Missing keys take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RingoConfig {
    /// `[execution]`
    pub execution: ExecutionSection,
    /// `[loader]`
    pub loader: LoaderSection,
    /// `[logging]`
    pub logging: LoggingSection,
}

impl RingoConfig {
    fn base() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn extract(figment: &Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Reads `ringo.toml` from the working directory plus the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if a source is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("ringo.toml")
    }

    /// Reads `path` plus the environment. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if a source is malformed.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Self::base()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RINGO_").split("__").lowercase(true));
        Self::extract(&figment)
    }

    /// Parses TOML text over the defaults, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] on malformed TOML or mistyped values.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Self::extract(&Self::base().merge(Toml::string(toml_str)))
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let exec = &self.execution;
        if !(1..=1024).contains(&exec.chunks_per_thread) {
            return Err(invalid(
                "execution.chunks_per_thread",
                format!("{} not in 1..=1024", exec.chunks_per_thread),
            ));
        }
        if exec.insertion_sort_threshold < 2 {
            return Err(invalid(
                "execution.insertion_sort_threshold",
                format!("{} is below 2", exec.insertion_sort_threshold),
            ));
        }
        if matches!(self.loader.delimiter, '\n' | '\r') {
            return Err(invalid(
                "loader.delimiter",
                "a line break cannot separate fields".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging.level",
                format!("'{}' is not one of {LOG_LEVELS:?}", self.logging.level),
            ));
        }
        Ok(())
    }

    /// Renders the config as pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
