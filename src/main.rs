//! Staging Sorter - watches an unclassified image folder and moves its
//! contents into classified target folders on command.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use rust_i18n::t;
use staging_sorter::{
    Cli, CommandLoop, Config, CountJournal, Error, EventWatcher, FileCounter, MoveService,
    NotifySource, WorkerPool, init_locale,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Initialize i18n for this binary
rust_i18n::i18n!("locales", fallback = "en");

const DEFAULT_CONFIG_NAME: &str = "sorter";
const MOVE_POOL: &str = "move-pool";
const WATCH_POOL: &str = "watch-pool";

// CLI Output Module
mod cli_output {
    //! Coloured one-line console messages outside the command loop.

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
    }

    pub fn print_success(msg: &str) {
        let _ = stdout().execute(Print(style("✓ ").with(CliTheme::SUCCESS).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }
}

fn main() -> Result<()> {
    // Initialize locale based on system settings
    init_locale();

    let cli = Cli::parse();

    if let Some(ref path) = cli.init_config {
        return write_sample_config(path);
    }

    let exe_dir = get_executable_dir()?;
    let config = load_config(&cli, &exe_dir)?;

    let log_path = get_log_path(&exe_dir, &cli, &config);
    let _guard = setup_logging(&cli, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Staging Sorter starting");
    if cli.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    match config.validate() {
        Ok(()) => {}
        // Move commands report this themselves; watching and the loop still run
        Err(Error::MissingSourcePath) => {
            warn!("Default source path is not configured");
            cli_output::print_warning(&t!("missing_source"));
        }
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            cli_output::print_error(&e.to_string());
            std::process::exit(1);
        }
    }

    run(&config)
}

/// Wire the pools, the watcher and the command loop, then shut down in order
fn run(config: &Config) -> Result<()> {
    let grace = config.shutdown_grace();
    let counter = Arc::new(FileCounter::new(config.staging_dir()));
    let journal = Arc::new(CountJournal::new(&config.count_log));
    let move_pool = Arc::new(WorkerPool::new(MOVE_POOL, config.mover_threads)?);

    let watcher = if config.watch {
        start_watcher(config, Arc::clone(&counter), Arc::clone(&journal))
    } else {
        cli_output::print_hint(&t!("watch_disabled"));
        None
    };

    let service = Arc::new(MoveService::new(
        config.clone(),
        Arc::clone(&move_pool),
        Arc::clone(&counter),
        journal,
    ));
    let command_loop = CommandLoop::new(config, service, counter);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let outcome = command_loop.run(stdin.lock(), &mut stdout);

    if let Some(watcher) = watcher {
        let report = watcher.shutdown();
        info!(?report, "Watcher stopped");
    }
    let report = move_pool.shutdown(grace);
    info!(?report, "Move pool stopped");

    outcome
}

/// Start watching the staging folder. Failure disables watching only.
fn start_watcher(
    config: &Config,
    counter: Arc<FileCounter>,
    journal: Arc<CountJournal>,
) -> Option<EventWatcher> {
    let dir = config.staging_dir();
    let started = WorkerPool::new(WATCH_POOL, config.watcher_threads).and_then(|pool| {
        EventWatcher::start(
            dir,
            Box::new(NotifySource::new()),
            Arc::new(pool),
            counter,
            journal,
            config.shutdown_grace(),
        )
    });

    match started {
        Ok(watcher) => {
            cli_output::print_success(&t!("watching", path = dir.display()));
            Some(watcher)
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to start the staging watcher");
            cli_output::print_warning(&t!("watch_failed", path = dir.display(), error = e));
            None
        }
    }
}

/// Write the sample configuration and exit
fn write_sample_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::sample_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    cli_output::print_success(&t!("config_written", path = path.display()));
    Ok(())
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the diagnostic log file path
fn get_log_path(exe_dir: &Path, cli: &Cli, config: &Config) -> PathBuf {
    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| exe_dir.join("Log"));
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    match cli.config_name() {
        Some(config_name) => log_dir.join(format!("{}_{}.log", config_name, timestamp)),
        None => log_dir.join(format!("Session_{}.log", timestamp)),
    }
}

/// Resolve config path - supports shorthand syntax
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config_path = match cli.config {
        Some(ref path) => Some(resolve_config_path(exe_dir, path)),
        None => {
            let default = exe_dir
                .join("Config")
                .join(DEFAULT_CONFIG_NAME)
                .with_extension("toml");
            default.exists().then_some(default)
        }
    };

    let config = match config_path {
        Some(path) => cli.merge_with_config(Config::load_from_file(&path)?),
        None => cli.to_config(),
    };

    Ok(config)
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    // Console only gets warnings so the prompt stays readable
    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(LevelFilter::WARN),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(LevelFilter::WARN),
            )
            .init();
    }

    Ok(guard)
}
