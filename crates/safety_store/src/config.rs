//! Store configuration and connection-string parsing.
//!
//! # Responsibility
//! - Describe where the database lives and how it is bootstrapped.
//! - Parse `key=value;` connection strings into a typed config.
//!
//! # Invariants
//! - Keys are matched case-insensitively with spaces ignored.
//! - Unknown keys are rejected instead of silently dropped.

use crate::logging::LogSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MEMORY_NAME: &str = "safety_store";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("connection string is missing a data source")]
    MissingDataSource,
    #[error("malformed connection string segment `{0}`")]
    MalformedSegment(String),
    #[error("unknown connection string key `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: &'static str, value: String },
    #[error("`Log Level` requires `Log Dir`")]
    LogLevelWithoutDirectory,
}

/// Physical location of the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseLocation {
    /// A SQLite database file; created on first use.
    File(PathBuf),
    /// A named shared-cache in-memory database, alive while the store is.
    Memory(String),
}

/// Schema bootstrap behavior applied on first initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitProfile {
    /// Create the database when absent and apply pending migrations.
    #[default]
    Migrate,
    /// Drop and recreate the schema; for isolated test runs.
    Recreate,
}

impl InitProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::Recreate => "recreate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub location: DatabaseLocation,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub profile: InitProfile,
    /// File logging started when the store opens; `None` leaves logging to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LogSettings>,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(path.into()),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            profile: InitProfile::Migrate,
            logging: None,
        }
    }

    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            location: DatabaseLocation::Memory(name.into()),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            profile: InitProfile::Migrate,
            logging: None,
        }
    }

    pub fn with_profile(mut self, profile: InitProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_logging(mut self, logging: LogSettings) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Parses a connection string such as
    /// `Data Source=/var/lib/safety/app.db;Busy Timeout=2000;Profile=migrate`.
    ///
    /// `Data Source=:memory:` or `Mode=Memory` select an in-memory database,
    /// optionally named with `Name=<name>`. `Log Dir=<absolute path>` and
    /// `Log Level=<level>` enable file logging.
    pub fn from_connection_string(value: &str) -> Result<Self, ConfigError> {
        let mut data_source: Option<String> = None;
        let mut memory = false;
        let mut name: Option<String> = None;
        let mut busy_timeout_ms = DEFAULT_BUSY_TIMEOUT_MS;
        let mut profile = InitProfile::Migrate;
        let mut log_dir: Option<PathBuf> = None;
        let mut log_level: Option<String> = None;

        for segment in value.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, raw) = segment
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedSegment(segment.to_string()))?;
            let raw = raw.trim();
            match normalize_key(key).as_str() {
                "datasource" | "filename" => data_source = Some(raw.to_string()),
                "mode" => match raw.to_ascii_lowercase().as_str() {
                    "memory" => memory = true,
                    "file" | "readwritecreate" => memory = false,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: "Mode",
                            value: raw.to_string(),
                        })
                    }
                },
                "name" => name = Some(raw.to_string()),
                "busytimeout" => {
                    busy_timeout_ms = raw.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "Busy Timeout",
                        value: raw.to_string(),
                    })?;
                }
                "profile" => {
                    profile = match raw.to_ascii_lowercase().as_str() {
                        "migrate" => InitProfile::Migrate,
                        "recreate" => InitProfile::Recreate,
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                key: "Profile",
                                value: raw.to_string(),
                            })
                        }
                    };
                }
                "logdir" => log_dir = Some(PathBuf::from(raw)),
                "loglevel" => log_level = Some(raw.to_string()),
                _ => return Err(ConfigError::UnknownKey(key.trim().to_string())),
            }
        }

        if data_source.as_deref() == Some(":memory:") {
            memory = true;
        }

        let location = if memory {
            DatabaseLocation::Memory(name.unwrap_or_else(|| DEFAULT_MEMORY_NAME.to_string()))
        } else {
            match data_source {
                Some(path) if !path.is_empty() => DatabaseLocation::File(PathBuf::from(path)),
                _ => return Err(ConfigError::MissingDataSource),
            }
        };

        let logging = match (log_dir, log_level) {
            (Some(directory), level) => {
                let settings = LogSettings::new(directory);
                Some(match level {
                    Some(level) => settings.with_level(level),
                    None => settings,
                })
            }
            (None, Some(_)) => return Err(ConfigError::LogLevelWithoutDirectory),
            (None, None) => None,
        };

        Ok(Self {
            location,
            busy_timeout_ms,
            profile,
            logging,
        })
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}
