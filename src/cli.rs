//! CLI argument parsing with clap

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Staging Sorter - watches an unclassified image folder and moves its
/// contents into classified target folders on command
///
/// Type a target code at the prompt to move everything in the source
/// folder into the folder configured for that code.
#[derive(Parser, Debug)]
#[command(name = "staging-sorter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long, env = "STAGING_SORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default source folder drained by move batches
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Unclassified staging folder to watch and count
    #[arg(short = 'w', long)]
    pub staging: Option<PathBuf>,

    /// Journal file for arrival and remaining-count lines
    #[arg(long)]
    pub count_log: Option<PathBuf>,

    /// Worker threads for move batches
    #[arg(long)]
    pub mover_threads: Option<usize>,

    /// Worker threads for watcher dispatch
    #[arg(long)]
    pub watcher_threads: Option<usize>,

    /// Do not watch the staging folder
    #[arg(long)]
    pub no_watch: bool,

    /// Write a sample configuration file to this path and exit
    #[arg(long, value_name = "PATH")]
    pub init_config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref source) = self.source {
            config.source_dir = source.clone();
        }
        if let Some(ref staging) = self.staging {
            config.staging_dir = staging.clone();
        }
        if let Some(ref count_log) = self.count_log {
            config.count_log = count_log.clone();
        }
        if let Some(threads) = self.mover_threads {
            config.mover_threads = threads;
        }
        if let Some(threads) = self.watcher_threads {
            config.watcher_threads = threads;
        }
        if self.no_watch {
            config.watch = false;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
