//! Configuration system for fixstore.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Main configuration struct for fixstore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Message store settings
    pub store: StoreConfig,
    /// Console session log
    pub screen_log: ScreenLogConfig,
    /// SQLite session log
    pub sqlite_log: SqliteLogConfig,
}

/// On-disk layout of the header index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    /// Space-separated `seq,offset,size` text records
    #[default]
    Text,
    /// Fixed-width 24-byte big-endian records
    Binary,
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexFormat::Text => f.write_str("text"),
            IndexFormat::Binary => f.write_str("binary"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for store files
    pub path: PathBuf,
    /// Sync every write to disk before returning
    pub sync_writes: bool,
    /// Header index layout
    pub index_format: IndexFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            sync_writes: true,
            index_format: IndexFormat::Text,
        }
    }
}

/// A `Y`/`N` switch. Booleans and `true`/`false` strings are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YesNo(pub bool);

impl YesNo {
    pub const YES: YesNo = YesNo(true);
    pub const NO: YesNo = YesNo(false);

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Y" | "y" | "true" | "TRUE" | "True" => Some(YesNo(true)),
            "N" | "n" | "false" | "FALSE" | "False" => Some(YesNo(false)),
            _ => None,
        }
    }

    pub fn is_yes(self) -> bool {
        self.0
    }
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        YesNo(value)
    }
}

impl Serialize for YesNo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if self.0 { "Y" } else { "N" })
    }
}

impl<'de> Deserialize<'de> for YesNo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => Ok(YesNo(value)),
            Raw::Text(text) => YesNo::parse(&text).ok_or_else(|| {
                serde::de::Error::custom(format!("expected Y or N, got '{}'", text))
            }),
        }
    }
}

/// Per-session overrides for the screen log categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogOverrides {
    #[serde(alias = "LogIncoming", skip_serializing_if = "Option::is_none")]
    pub log_incoming: Option<YesNo>,
    #[serde(alias = "LogOutgoing", skip_serializing_if = "Option::is_none")]
    pub log_outgoing: Option<YesNo>,
    #[serde(alias = "LogEvents", skip_serializing_if = "Option::is_none")]
    pub log_events: Option<YesNo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenLogConfig {
    /// Log incoming messages (default `Y`)
    #[serde(alias = "LogIncoming", skip_serializing_if = "Option::is_none")]
    pub log_incoming: Option<YesNo>,
    /// Log outgoing messages (default `Y`)
    #[serde(alias = "LogOutgoing", skip_serializing_if = "Option::is_none")]
    pub log_outgoing: Option<YesNo>,
    /// Log session events (default `Y`)
    #[serde(alias = "LogEvents", skip_serializing_if = "Option::is_none")]
    pub log_events: Option<YesNo>,
    /// Overrides keyed by session file stem (`FIX.4.2-SENDER-TARGET`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sessions: BTreeMap<String, LogOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteLogConfig {
    /// Database file; the SQLite log is disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .collect()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    /// Field path (e.g., "store.path")
    pub field: String,
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Build the layered figment: user config, project config, an optional
    /// explicit file, then `FIXSTORE_` environment variables.
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            .merge(Toml::file("fixstore.toml"));
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("FIXSTORE_").split("__"))
    }

    /// Load configuration from all sources.
    pub fn load(explicit: Option<&Path>) -> Result<Self, figment::Error> {
        Self::from_figment(Self::figment(explicit))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    /// Load and validate configuration.
    pub fn load_validated(explicit: Option<&Path>) -> Result<Self, Error> {
        let config = Self::load(explicit)?;
        config.into_validated()
    }

    /// Reject configurations with errors and log warnings.
    pub fn into_validated(self) -> Result<Self, Error> {
        let result = self.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.store.path.as_os_str().is_empty() {
            result.add_error("store.path", "Store path cannot be empty");
        }

        if !self.store.sync_writes {
            result.add_warning(
                "store.sync_writes",
                "Buffered writes may lose the most recent messages on a crash",
            );
        }

        if let Some(ref path) = self.sqlite_log.path {
            if path.as_os_str().is_empty() {
                result.add_error("sqlite_log.path", "Database path cannot be empty");
            }
        }

        for key in self.screen_log.sessions.keys() {
            if key.split('-').count() < 3 {
                result.add_warning(
                    format!("screen_log.sessions.{}", key),
                    "Expected a session stem like BEGIN-SENDER-TARGET",
                );
            }
        }

        result
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("fixstore"))
            .unwrap_or_else(|| PathBuf::from("~/.config/fixstore"))
    }
}
