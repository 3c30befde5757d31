//! End-to-end pipeline tests over an in-memory backend

mod common;

use common::{eventually, fast_config, MemoryBackend, Recorder};
use settle_watcher::{CallbackEvent, Op, Watcher};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(600);

async fn started(root: &TempDir) -> (Watcher, std::sync::Arc<MemoryBackend>, Recorder) {
    let watcher = Watcher::new(fast_config());
    let (recorder, observer) = Recorder::new();
    watcher.set_path_callback_listener(observer);

    let (backend, streams) = MemoryBackend::new();
    watcher
        .start_with_backend(&[root.path().to_path_buf()], backend.clone(), streams)
        .await
        .unwrap();
    (watcher, backend, recorder)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_watches_every_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::create_dir_all(root.join("c")).unwrap();
    fs::write(root.join("a/file.txt"), b"x").unwrap();

    let (watcher, backend, _recorder) = started(&temp_dir).await;

    let mut expected = vec![
        root.to_path_buf(),
        root.join("a"),
        root.join("a/b"),
        root.join("c"),
    ];
    expected.sort();
    assert_eq!(watcher.watched_paths().await, expected);
    assert!(!backend.is_watching(&root.join("a/file.txt")));
    assert!(watcher.is_running().await);

    watcher.graceful_stop().await;
    assert!(!watcher.is_running().await);
    assert!(watcher.watched_paths().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_file_settles_once() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    let file = temp_dir.path().join("new.txt");
    fs::write(&file, b"hello").unwrap();
    assert!(backend.emit(&file, Op::Create));

    assert_eq!(recorder.next(WAIT).await, CallbackEvent::settled(&file));
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_twelve_files_produce_twelve_callbacks() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    let mut expected = BTreeSet::new();
    for i in 0..12 {
        let file = temp_dir.path().join(format!("burst{:02}.txt", i));
        fs::write(&file, b"data").unwrap();
        assert!(backend.emit(&file, Op::Create));
        expected.insert(file);
    }

    let events = recorder.take(12, WAIT).await;
    assert!(events.iter().all(|e| e.exists));
    let paths: BTreeSet<PathBuf> = events.into_iter().map(|e| e.path).collect();
    assert_eq!(paths, expected);
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deleted_file_reports_gone() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("doomed.txt");
    fs::write(&file, b"bye").unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    fs::remove_file(&file).unwrap();
    assert!(backend.emit(&file, Op::Remove));

    assert_eq!(recorder.next(WAIT).await, CallbackEvent::gone(&file));
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_removal_reports_gone_once() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("sub");
    fs::create_dir(&dir).unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;
    assert!(backend.is_watching(&dir));

    // First signal arrives while the directory still stats: unwatch, stay silent
    assert!(backend.emit(&dir, Op::Remove));
    assert!(eventually(WAIT, || !backend.is_watching(&dir)).await);
    recorder.assert_quiet(QUIET).await;

    // Follow-up signal once it is really gone: exactly one notification
    fs::remove_dir(&dir).unwrap();
    assert!(backend.emit(&dir, Op::Remove));

    assert_eq!(recorder.next(WAIT).await, CallbackEvent::gone(&dir));
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deleted_directory_with_two_signals_reports_gone_once() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("sub");
    fs::create_dir(&dir).unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    // The parent's entry removal and the directory's own delete-self
    fs::remove_dir(&dir).unwrap();
    assert!(backend.emit(&dir, Op::Remove));
    assert!(backend.emit(&dir, Op::Remove));

    assert_eq!(recorder.next(WAIT).await, CallbackEvent::gone(&dir));
    recorder.assert_quiet(QUIET).await;
    assert!(!backend.is_watching(&dir));

    // A late third signal is still the same disappearance
    assert!(backend.emit(&dir, Op::Remove));
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_removed_during_check_reports_once() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    let file = temp_dir.path().join("brief.txt");
    fs::write(&file, b"short-lived").unwrap();
    assert!(backend.emit(&file, Op::Create));
    fs::remove_file(&file).unwrap();
    assert!(backend.emit(&file, Op::Remove));

    assert_eq!(recorder.next(WAIT).await, CallbackEvent::gone(&file));
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recreated_path_reports_gone_again() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("cycle.txt");
    fs::write(&file, b"1").unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    fs::remove_file(&file).unwrap();
    assert!(backend.emit(&file, Op::Remove));
    assert_eq!(recorder.next(WAIT).await, CallbackEvent::gone(&file));

    fs::write(&file, b"2").unwrap();
    assert!(backend.emit(&file, Op::Create));
    assert_eq!(recorder.next(WAIT).await, CallbackEvent::settled(&file));

    fs::remove_file(&file).unwrap();
    assert!(backend.emit(&file, Op::Remove));
    assert_eq!(recorder.next(WAIT).await, CallbackEvent::gone(&file));
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_write_and_chmod_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("sub");
    fs::create_dir(&dir).unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    assert!(backend.emit(&dir, Op::Write));
    assert!(backend.emit(&dir, Op::Chmod));
    assert!(backend.emit(&dir, Op::Unknown));

    recorder.assert_quiet(QUIET).await;
    assert!(backend.is_watching(&dir));

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_creation_burst_refreshes_once() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    let dirs: Vec<PathBuf> = (0..5)
        .map(|i| temp_dir.path().join(format!("new{}", i)))
        .collect();
    for dir in &dirs {
        fs::create_dir_all(dir.join("inner")).unwrap();
        assert!(backend.emit(dir, Op::Create));
        // Shorter than the 300ms quiet period, so every Create resets it
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(!backend.is_watching(&dirs[0]));

    assert!(
        eventually(WAIT, || dirs.iter().all(|d| backend.is_watching(d))).await,
        "batched refresh never ran"
    );
    for dir in &dirs {
        assert_eq!(backend.add_count(dir), 1);
        assert!(backend.is_watching(&dir.join("inner")));
        assert_eq!(backend.add_count(&dir.join("inner")), 1);
    }

    // Each new directory is announced once through the stability check
    let events = recorder.take(dirs.len(), WAIT).await;
    let announced: BTreeSet<PathBuf> = events.into_iter().map(|e| e.path).collect();
    assert_eq!(announced, dirs.iter().cloned().collect());
    recorder.assert_quiet(QUIET).await;

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_backend_errors_do_not_stop_the_loop() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    assert!(backend.emit_error("queue overflow"));
    let file = temp_dir.path().join("after-error.txt");
    fs::write(&file, b"x").unwrap();
    assert!(backend.emit(&file, Op::Write));

    assert_eq!(recorder.next(WAIT).await, CallbackEvent::settled(&file));

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_callbacks_after_stop() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, backend, mut recorder) = started(&temp_dir).await;

    watcher.graceful_stop().await;
    watcher.graceful_stop().await;

    let file = temp_dir.path().join("late.txt");
    fs::write(&file, b"x").unwrap();
    assert!(!backend.emit(&file, Op::Create));
    recorder.assert_quiet(QUIET).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_resets_run() {
    let first_root = TempDir::new().unwrap();
    let second_root = TempDir::new().unwrap();
    let (watcher, first_backend, mut recorder) = started(&first_root).await;

    let (second_backend, streams) = MemoryBackend::new();
    watcher
        .start_with_backend(
            &[second_root.path().to_path_buf()],
            second_backend.clone(),
            streams,
        )
        .await
        .unwrap();

    assert_eq!(
        watcher.watched_paths().await,
        vec![second_root.path().to_path_buf()]
    );
    assert!(!first_backend.emit(first_root.path().join("x"), Op::Create));

    let file = second_root.path().join("fresh.txt");
    fs::write(&file, b"x").unwrap();
    assert!(second_backend.emit(&file, Op::Create));
    assert_eq!(recorder.next(WAIT).await, CallbackEvent::settled(&file));

    watcher.graceful_stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_watchers() {
    let left_root = TempDir::new().unwrap();
    let right_root = TempDir::new().unwrap();
    let (left, left_backend, mut left_events) = started(&left_root).await;
    let (right, right_backend, mut right_events) = started(&right_root).await;

    let left_file = left_root.path().join("l.txt");
    let right_file = right_root.path().join("r.txt");
    fs::write(&left_file, b"l").unwrap();
    fs::write(&right_file, b"r").unwrap();
    assert!(left_backend.emit(&left_file, Op::Create));
    assert!(right_backend.emit(&right_file, Op::Create));

    assert_eq!(left_events.next(WAIT).await, CallbackEvent::settled(&left_file));
    assert_eq!(right_events.next(WAIT).await, CallbackEvent::settled(&right_file));

    left.graceful_stop().await;
    assert!(right.is_running().await);
    right.graceful_stop().await;

    left_events.assert_quiet(Duration::from_millis(100)).await;
    right_events.assert_quiet(Duration::from_millis(100)).await;
}
