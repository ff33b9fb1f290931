//! Move-to-target orchestration behind one operator command

use crate::config::Config;
use crate::counter::FileCounter;
use crate::error::{Error, Result};
use crate::journal::CountJournal;
use crate::mover::{BatchDiscoverer, BatchResult, MoveExecutor};
use crate::pool::WorkerPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Resolves target codes and runs move batches from the configured source
#[derive(Debug)]
pub struct MoveService {
    source_dir: PathBuf,
    config: Config,
    discoverer: BatchDiscoverer,
    executor: MoveExecutor,
}

impl MoveService {
    pub fn new(
        config: Config,
        pool: Arc<WorkerPool>,
        counter: Arc<FileCounter>,
        journal: Arc<CountJournal>,
    ) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            config,
            discoverer: BatchDiscoverer::new(),
            executor: MoveExecutor::new(pool, counter, journal),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Move everything in the source folder into the folder configured for
    /// `code`. Blocks until every unit has been relocated or has failed.
    pub fn move_to_target(&self, code: &str) -> Result<BatchResult> {
        if self.source_dir.as_os_str().is_empty() {
            error!("Default source path is not configured");
            return Err(Error::MissingSourcePath);
        }

        let target = match self.config.target(code) {
            Ok(target) => target.to_path_buf(),
            Err(e) => {
                error!(code, "No target path is configured for this code");
                return Err(e);
            }
        };

        if is_within(&target, &self.source_dir) {
            error!(
                target = %target.display(),
                source = %self.source_dir.display(),
                "Target lies inside the source folder"
            );
            return Err(Error::DestinationInsideSource {
                target,
                source_root: self.source_dir.clone(),
            });
        }

        let plan = match self.discoverer.discover(&self.source_dir, &target) {
            Ok(plan) => plan,
            Err(e) => {
                error!(source = %self.source_dir.display(), error = %e, "Failed to check source directory");
                return Err(e);
            }
        };

        if plan.is_empty() {
            info!(source = %self.source_dir.display(), "No files in source directory, returning directly");
            return Ok(BatchResult::default());
        }

        Ok(self.executor.execute(&plan))
    }
}

/// `path` equals `root` or lies below it, comparing resolved paths when
/// both exist
fn is_within(path: &Path, root: &Path) -> bool {
    let resolve = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    let root = resolve(root);
    // The target may not exist yet, so resolve its closest existing ancestor
    let mut probe = path.to_path_buf();
    let mut tail = Vec::new();
    while !probe.exists() {
        match (probe.file_name().map(|n| n.to_os_string()), probe.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(name);
                probe = parent.to_path_buf();
            }
            _ => break,
        }
    }
    let mut resolved = resolve(&probe);
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    resolved.starts_with(&root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn service(dir: &TempDir) -> MoveService {
        let source = dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        let mut config = Config {
            source_dir: source.clone(),
            ..Config::default()
        };
        config.targets.insert("cat".into(), dir.path().join("gallery").join("cats"));
        config.targets.insert("inner".into(), source.join("sorted"));
        MoveService::new(
            config,
            Arc::new(WorkerPool::new("service-test", 3).unwrap()),
            Arc::new(FileCounter::new(&source)),
            Arc::new(CountJournal::new(dir.path().join("remaining.log"))),
        )
    }

    #[test]
    fn test_moves_into_configured_target() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        fs::write(service.source_dir().join("a.png"), b"a").unwrap();

        let result = service.move_to_target("cat").unwrap();

        assert!(result.found_files);
        assert_eq!(result.moved, 1);
        assert!(dir.path().join("gallery").join("cats").join("a.png").exists());
    }

    #[test]
    fn test_unknown_code_moves_nothing() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        fs::write(service.source_dir().join("a.png"), b"a").unwrap();

        assert!(matches!(
            service.move_to_target("dog"),
            Err(Error::UnknownTarget { .. })
        ));
        assert!(service.source_dir().join("a.png").exists());
    }

    #[test]
    fn test_empty_source_returns_directly() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        let result = service.move_to_target("cat").unwrap();

        assert_eq!(result, BatchResult::default());
        assert!(!dir.path().join("gallery").exists());
    }

    #[test]
    fn test_target_inside_source_is_rejected() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        fs::write(service.source_dir().join("a.png"), b"a").unwrap();

        assert!(matches!(
            service.move_to_target("inner"),
            Err(Error::DestinationInsideSource { .. })
        ));
        assert!(service.source_dir().join("a.png").exists());
    }

    #[test]
    fn test_missing_source_path() {
        let dir = tempdir().unwrap();
        let service = MoveService::new(
            Config::default(),
            Arc::new(WorkerPool::new("service-empty", 1).unwrap()),
            Arc::new(FileCounter::new(dir.path())),
            Arc::new(CountJournal::new(dir.path().join("remaining.log"))),
        );
        assert!(matches!(
            service.move_to_target("cat"),
            Err(Error::MissingSourcePath)
        ));
    }

    #[test]
    fn test_is_within() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        assert!(is_within(&root, &root));
        assert!(is_within(&root.join("not").join("yet"), &root));
        assert!(!is_within(&dir.path().join("elsewhere"), &root));
    }

    #[cfg(unix)]
    #[test]
    fn test_discovery_error_is_propagated() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-folder");
        fs::write(&file, b"x").unwrap();
        let source = file.join("source");
        let target = dir.path().join("gallery").join("cats");
        let mut config = Config {
            source_dir: source.clone(),
            ..Config::default()
        };
        config.targets.insert("cat".into(), target.clone());
        let service = MoveService::new(
            config,
            Arc::new(WorkerPool::new("service-broken", 1).unwrap()),
            Arc::new(FileCounter::new(&source)),
            Arc::new(CountJournal::new(dir.path().join("remaining.log"))),
        );

        assert!(matches!(service.move_to_target("cat"), Err(Error::Io(_))));
        assert!(!target.exists());
        assert!(!dir.path().join("remaining.log").exists());
    }
}
