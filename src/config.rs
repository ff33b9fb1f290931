//! Configuration types for the staging sorter

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the staging sorter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default source path: the folder whose entries a move batch drains
    pub source_dir: PathBuf,

    /// Unclassified staging folder whose regular-file count is tracked
    pub staging_dir: PathBuf,

    /// Append-only journal of arrivals, moves and remaining counts
    pub count_log: PathBuf,

    /// Directory for diagnostic session logs (defaults to `<exe>/Log`)
    pub log_dir: Option<PathBuf>,

    /// Output file of the `:collect` command
    pub collection_file: Option<PathBuf>,

    /// Worker threads used by move batches
    pub mover_threads: usize,

    /// Worker threads used by watcher dispatch tasks
    pub watcher_threads: usize,

    /// Grace period for in-flight work when shutting down, in seconds
    pub shutdown_grace_secs: u64,

    /// Watch the staging folder for new arrivals
    pub watch: bool,

    /// Target path codes mapped to destination folders
    pub targets: BTreeMap<String, PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            staging_dir: PathBuf::new(),
            count_log: PathBuf::from("unclassified_remaining_images.log"),
            log_dir: None,
            collection_file: None,
            mover_threads: 3,
            watcher_threads: 5,
            shutdown_grace_secs: 60,
            watch: true,
            targets: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up the destination configured for a target path code
    pub fn target(&self, code: &str) -> Result<&Path> {
        self.targets
            .get(code)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::UnknownTarget {
                code: code.to_string(),
            })
    }

    /// Staging folder, falling back to the source folder when unset
    pub fn staging_dir(&self) -> &Path {
        if self.staging_dir.as_os_str().is_empty() {
            &self.source_dir
        } else {
            &self.staging_dir
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Check the settings every command depends on.
    ///
    /// Settings that prevent startup are reported before `MissingSourcePath`,
    /// which only affects move commands.
    pub fn validate(&self) -> Result<()> {
        if self.mover_threads == 0 || self.watcher_threads == 0 {
            return Err(Error::Config(
                "mover_threads and watcher_threads must be at least 1".into(),
            ));
        }
        if self.source_dir.as_os_str().is_empty() {
            return Err(Error::MissingSourcePath);
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Staging Sorter Configuration File
# This file uses TOML format (https://toml.io)

# Default source path: every entry directly inside it is moved by a batch
source_dir = "D:/Illustrations/Unclassified"

# Folder whose regular files are counted as "remaining unclassified images"
# (defaults to source_dir when omitted)
staging_dir = "D:/Illustrations/Unclassified"

# Append-only journal of arrivals and moves with the remaining count
count_log = "D:/Illustrations/unclassified_remaining_images.log"

# Output of the :collect command (one sub-directory per line)
# collection_file = "D:/Illustrations/path_collection.txt"

# Worker threads for move batches and for watcher dispatch
mover_threads = 3
watcher_threads = 5

# Seconds to wait for in-flight work on shutdown
shutdown_grace_secs = 60

# Watch the staging folder for new arrivals
watch = true

# Target path codes typed at the prompt, mapped to destination folders
[targets]
cat = "D:/Illustrations/Cats"
ls = "D:/Illustrations/Landscapes"
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file '{}': {source}", path.display())]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {source}")]
    SerializeError { source: toml::ser::Error },
}
