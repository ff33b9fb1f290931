//! End-to-end runs through the public API

use staging_sorter::{
    BatchDiscoverer, Config, CountJournal, EventWatcher, FileCounter, MoveExecutor, MoveService,
    NotifySource, WorkerPool,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn journal_lines(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn remaining(line: &str) -> usize {
    line.rsplit(": ").next().unwrap().trim().parse().unwrap()
}

#[test]
fn test_batch_moves_files_and_subdirectory() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("unclassified");
    let destination = dir.path().join("gallery").join("cats");
    let log = dir.path().join("remaining.log");
    fs::create_dir_all(source.join("sub")).unwrap();
    fs::write(source.join("a.png"), b"a").unwrap();
    fs::write(source.join("b.png"), b"b").unwrap();
    fs::write(source.join("sub").join("inner.png"), b"inner").unwrap();

    let pool = Arc::new(WorkerPool::new("move-pool", 3).unwrap());
    let executor = MoveExecutor::new(
        Arc::clone(&pool),
        Arc::new(FileCounter::new(&source)),
        Arc::new(CountJournal::new(&log)),
    );

    let plan = BatchDiscoverer::new().discover(&source, &destination).unwrap();
    let result = executor.execute(&plan);

    assert!(result.found_files);
    assert_eq!(result.submitted, 3);
    assert_eq!(result.moved, 3);
    assert_eq!(result.failed, 0);

    assert_eq!(fs::read(destination.join("a.png")).unwrap(), b"a");
    assert_eq!(fs::read(destination.join("b.png")).unwrap(), b"b");
    assert_eq!(
        fs::read(destination.join("sub").join("inner.png")).unwrap(),
        b"inner"
    );
    assert_eq!(fs::read_dir(&source).unwrap().count(), 0);

    let lines = journal_lines(&log);
    assert_eq!(lines.len(), 3);
    for line in &lines {
        assert!(line.contains("INFO [Client] - File(s) has/have been moved"));
        assert!(remaining(line) <= 2);
    }

    pool.shutdown(Duration::from_secs(5));
}

#[test]
fn test_command_on_empty_source_changes_nothing() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("unclassified");
    let target = dir.path().join("gallery").join("cats");
    let log = dir.path().join("remaining.log");
    fs::create_dir_all(&source).unwrap();

    let mut config = Config {
        source_dir: source.clone(),
        ..Config::default()
    };
    config.targets.insert("cat".into(), target.clone());

    let service = MoveService::new(
        config,
        Arc::new(WorkerPool::new("move-pool", 3).unwrap()),
        Arc::new(FileCounter::new(&source)),
        Arc::new(CountJournal::new(&log)),
    );
    let result = service.move_to_target("cat").unwrap();

    assert!(!result.found_files);
    assert_eq!(result.submitted, 0);
    assert!(!target.exists());
    assert!(!log.exists());
}

#[test]
fn test_watcher_journals_new_file_without_moving_it() {
    let dir = tempdir().unwrap();
    let staging: PathBuf = dir.path().join("staging");
    let log = dir.path().join("remaining.log");
    fs::create_dir_all(&staging).unwrap();

    let watcher = EventWatcher::start(
        &staging,
        Box::new(NotifySource::new()),
        Arc::new(WorkerPool::new("watch-pool", 5).unwrap()),
        Arc::new(FileCounter::new(&staging)),
        Arc::new(CountJournal::new(&log)),
        Duration::from_secs(5),
    )
    .unwrap();

    fs::write(staging.join("c.png"), b"c").unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while journal_lines(&log).is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    watcher.shutdown();

    let lines = journal_lines(&log);
    assert!(!lines.is_empty());
    assert!(lines[0].contains("New files added: c.png"));
    assert_eq!(remaining(&lines[0]), 1);
    assert!(staging.join("c.png").exists());
}
