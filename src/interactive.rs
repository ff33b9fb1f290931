//! Operator command loop: target codes, folder shortcuts and pass-through commands

use crate::collect::{collect_subdirectories, write_collection};
use crate::config::Config;
use crate::counter::FileCounter;
use crate::error::Error;
use crate::service::MoveService;
use rust_i18n::t;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens a folder for the operator, e.g. in the platform file browser
pub type Opener = Box<dyn Fn(&Path) -> io::Result<()> + Send + Sync>;

/// What one line of input turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Count,
    Targets,
    Collect(Option<PathBuf>),
    Quit,
    Open(PathBuf),
    Move(String),
}

impl Command {
    /// Classify a trimmed, non-empty input line
    pub fn parse(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix(':') {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default();
            let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
            match name {
                "count" => return Command::Count,
                "targets" => return Command::Targets,
                "collect" => return Command::Collect(arg.map(PathBuf::from)),
                "quit" | "q" | "exit" => return Command::Quit,
                "help" | "h" => return Command::Help,
                _ => {}
            }
        }

        let path = Path::new(line);
        if path.exists() {
            Command::Open(path.to_path_buf())
        } else {
            Command::Move(line.to_string())
        }
    }
}

/// Line-oriented operator loop over any reader/writer pair
pub struct CommandLoop {
    service: Arc<MoveService>,
    counter: Arc<FileCounter>,
    targets: BTreeMap<String, PathBuf>,
    collection_file: Option<PathBuf>,
    opener: Opener,
}

impl CommandLoop {
    pub fn new(config: &Config, service: Arc<MoveService>, counter: Arc<FileCounter>) -> Self {
        Self {
            service,
            counter,
            targets: config.targets.clone(),
            collection_file: config.collection_file.clone(),
            opener: Box::new(|path: &Path| crate::os::open_in_file_browser(path)),
        }
    }

    /// Replace how folders are opened
    pub fn with_opener(mut self, opener: Opener) -> Self {
        self.opener = opener;
        self
    }

    /// Read commands until end of input or `:quit`
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, output: &mut W) -> anyhow::Result<()> {
        writeln!(output, "{}", t!("welcome"))?;

        let mut line = String::new();
        loop {
            write!(output, "{}", t!("prompt"))?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let command = Command::parse(trimmed);
            debug!(?command, "Operator command");
            let quit = command == Command::Quit;
            self.dispatch(command, output)?;
            writeln!(output, "{}", t!("separator"))?;
            if quit {
                break;
            }
        }
        Ok(())
    }

    fn dispatch<W: Write>(&self, command: Command, output: &mut W) -> io::Result<()> {
        match command {
            Command::Help => writeln!(output, "{}", t!("help")),
            Command::Quit => writeln!(output, "{}", t!("goodbye")),
            Command::Count => match self.counter.count() {
                Ok(count) => writeln!(output, "{}", t!("remaining_count", count = count)),
                Err(e) => {
                    warn!(error = %e, "Count command failed");
                    writeln!(output, "{}", t!("count_failed", error = e))
                }
            },
            Command::Targets => {
                if self.targets.is_empty() {
                    return writeln!(output, "{}", t!("no_targets"));
                }
                writeln!(output, "{}", t!("targets_header"))?;
                for (code, path) in &self.targets {
                    writeln!(output, "  {:<12} {}", code, path.display())?;
                }
                Ok(())
            }
            Command::Collect(root) => self.collect(root, output),
            Command::Open(path) => match (self.opener)(&path) {
                Ok(()) => writeln!(output, "{}", t!("opened_folder", path = path.display())),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to open folder");
                    writeln!(
                        output,
                        "{}",
                        t!("open_failed", path = path.display(), error = e)
                    )
                }
            },
            Command::Move(code) => self.move_batch(&code, output),
        }
    }

    fn move_batch<W: Write>(&self, code: &str, output: &mut W) -> io::Result<()> {
        let message = match self.service.move_to_target(code) {
            Ok(result) if !result.found_files && result.submitted == 0 => t!(
                "nothing_to_move",
                source = self.service.source_dir().display()
            ),
            Ok(result) => t!(
                "moved_summary",
                moved = result.moved,
                failed = result.failed,
                code = code
            ),
            Err(Error::UnknownTarget { code }) => t!("unknown_target", code = code),
            Err(Error::MissingSourcePath) => t!("missing_source"),
            Err(Error::DestinationInsideSource {
                target,
                source_root,
            }) => t!(
                "target_inside_source",
                target = target.display(),
                source = source_root.display()
            ),
            Err(e) => t!("move_failed", error = e),
        };
        writeln!(output, "{}", message)
    }

    fn collect<W: Write>(&self, root: Option<PathBuf>, output: &mut W) -> io::Result<()> {
        let Some(output_file) = &self.collection_file else {
            return writeln!(output, "{}", t!("collect_no_output"));
        };

        // Without an argument, collect below the folder holding the first target
        let root = root.or_else(|| {
            self.targets
                .values()
                .next()
                .and_then(|target| target.parent())
                .map(Path::to_path_buf)
        });
        let Some(root) = root else {
            return writeln!(output, "{}", t!("collect_no_root"));
        };

        let written = collect_subdirectories(&root)
            .and_then(|paths| write_collection(&paths, output_file).map(|()| paths.len()));
        match written {
            Ok(count) => writeln!(
                output,
                "{}",
                t!("collect_done", count = count, output = output_file.display())
            ),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Collect command failed");
                writeln!(output, "{}", t!("collect_failed", error = e))
            }
        }
    }
}
