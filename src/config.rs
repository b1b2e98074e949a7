//! Configuration and CLI argument handling

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::error::ConfigError;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "alarm-runtime")]
#[command(about = "Runtime-tracking timer and alarm trigger engine for smart-home switches")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "8765")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Directory holding the persisted JSON stores
    #[arg(short, long, default_value = ".alarm-runtime")]
    pub storage_dir: PathBuf,

    /// TOML file with one [[entry]] table per monitored switch
    #[arg(short, long)]
    pub entries: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

fn default_reset_time() -> String {
    "00:00".to_string()
}

fn default_true() -> bool {
    true
}

/// One runtime-tracking instance bound to a monitored switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub entry_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub switch_entity_id: Option<String>,
    /// Daily reset time-of-day, `HH:MM` or `HH:MM:SS`
    #[serde(default = "default_reset_time")]
    pub reset_time: String,
    /// Operator notification targets as `domain.service`
    #[serde(default)]
    pub notification_entities: Vec<String>,
    #[serde(default)]
    pub show_seconds: bool,
    #[serde(default = "default_true")]
    pub alarm_enabled: bool,
}

impl EntryConfig {
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            name: None,
            switch_entity_id: None,
            reset_time: default_reset_time(),
            notification_entities: Vec::new(),
            show_seconds: false,
            alarm_enabled: true,
        }
    }

    /// Title used for the snapshot and as notification title
    pub fn instance_title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("Timer")
    }

    pub fn switch_entity(&self) -> Option<&str> {
        self.switch_entity_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
struct EntriesFile {
    #[serde(default, rename = "entry")]
    entries: Vec<EntryConfig>,
}

/// Parse the `[[entry]]` tables of an entries file
pub fn parse_entries(raw: &str, path: &Path) -> Result<Vec<EntryConfig>, ConfigError> {
    let file: EntriesFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = HashSet::new();
    for entry in &file.entries {
        if entry.entry_id.is_empty() {
            return Err(ConfigError::Invalid("entry_id must not be empty".to_string()));
        }
        if !seen.insert(entry.entry_id.clone()) {
            return Err(ConfigError::Invalid(format!("duplicate entry_id '{}'", entry.entry_id)));
        }
    }
    Ok(file.entries)
}

/// Load the entries file from disk
pub async fn load_entries(path: &Path) -> Result<Vec<EntryConfig>, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_entries(&raw, path)
}
