//! Tests for engine.rs — push, pull and remote directory helpers.

use boxsync_cloud::{MemoryObjectStore, ObjectStore, StoreCall};
use boxsync_sync::{Session, SyncEngine, SyncError};
use boxsync_types::NamespaceRoot;
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

const NS: &str = "u-123";

fn session(root: &Path) -> Session {
    Session::new(NamespaceRoot::new(NS).unwrap(), "alice", root)
}

fn engine_with(store: &Arc<MemoryObjectStore>) -> SyncEngine {
    SyncEngine::new(store.clone() as Arc<dyn ObjectStore>)
}

fn remote_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// Collects formatted log lines for the lifetime of the returned guard.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn capture(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn puts(calls: &[StoreCall]) -> Vec<(String, u64)> {
    calls
        .iter()
        .filter_map(|call| match call {
            StoreCall::Put { key, size } => Some((key.clone(), *size)),
            _ => None,
        })
        .collect()
}

fn gets(calls: &[StoreCall]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|call| match call {
            StoreCall::Get { key } => Some(key.clone()),
            _ => None,
        })
        .collect()
}

fn lists(calls: &[StoreCall]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, StoreCall::List { .. }))
        .count()
}

// ── Push ────────────────────────────────────────────────────────

#[tokio::test]
async fn push_uploads_file_and_marker() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("notes.txt"), b"0123456789").unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    let report = engine_with(&store).push(&session).await.unwrap();

    assert_eq!(
        puts(&store.calls().await),
        vec![
            ("u-123/docs/".to_string(), 0),
            ("u-123/notes.txt".to_string(), 10),
        ]
    );
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.markers_written, 1);
    assert_eq!(report.bytes_transferred, 10);
    assert!(report.is_clean());
}

#[tokio::test]
async fn push_walks_nested_directories() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::write(root.join("a/b/deep.txt"), b"deep").unwrap();
    fs::write(root.join("a/top.txt"), b"top").unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    engine_with(&store).push(&session).await.unwrap();

    assert_eq!(
        store.keys().await,
        vec![
            "u-123/a/",
            "u-123/a/b/",
            "u-123/a/b/deep.txt",
            "u-123/a/top.txt",
        ]
    );
    assert_eq!(store.content("u-123/a/b/deep.txt").await.unwrap(), b"deep");
}

#[tokio::test]
async fn push_overwrites_remote_copy() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("notes.txt"), b"local").unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/notes.txt", b"remote, and newer", SystemTime::now()).await;
    engine_with(&store).push(&session).await.unwrap();

    assert_eq!(store.content("u-123/notes.txt").await.unwrap(), b"local");
}

#[tokio::test]
async fn push_creates_missing_user_root() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::new());
    let report = engine_with(&store).push(&session).await.unwrap();

    assert!(session.user_root().is_dir());
    assert!(store.keys().await.is_empty());
    assert_eq!(report.uploaded, 0);
}

#[tokio::test]
async fn push_continues_past_failed_upload() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(root.join(name), name.as_bytes()).unwrap();
    }

    let store = Arc::new(MemoryObjectStore::new());
    store.fail_on("u-123/b.txt").await;
    let report = engine_with(&store).push(&session).await.unwrap();

    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "b.txt");
    assert_eq!(store.keys().await, vec!["u-123/a.txt", "u-123/c.txt"]);
}

#[cfg(unix)]
#[tokio::test]
async fn push_skips_symlinks() {
    let tmp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("secret.txt"), b"secret").unwrap();

    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    let report = engine_with(&store).push(&session).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert!(store.keys().await.is_empty());
}

// ── Pull ────────────────────────────────────────────────────────

#[tokio::test]
async fn pull_recreates_stale_directory_empty() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let docs = session.user_root().join("docs");
    fs::create_dir_all(docs.join("sub")).unwrap();
    fs::write(docs.join("stale.txt"), b"old").unwrap();
    fs::write(docs.join("sub/deep.txt"), b"older").unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/docs/", b"", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert!(docs.is_dir());
    assert_eq!(fs::read_dir(&docs).unwrap().count(), 0);
    assert_eq!(report.directories_recreated, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn pull_skips_current_file() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    let local = root.join("notes.txt");
    fs::write(&local, b"0123456789").unwrap();
    set_mtime(&local, remote_time());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/notes.txt", b"9876543210", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert!(gets(&store.calls().await).is_empty());
    assert_eq!(report.up_to_date, 1);
    assert_eq!(report.downloaded, 0);
    assert_eq!(fs::read(&local).unwrap(), b"0123456789");
}

#[tokio::test]
async fn pull_logs_current_file_as_up_to_date() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    let local = root.join("notes.txt");
    fs::write(&local, b"0123456789").unwrap();
    set_mtime(&local, remote_time());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/notes.txt", b"9876543210", remote_time()).await;
    let logs = LogBuffer::default();
    let report = {
        let _guard = logs.capture();
        engine_with(&store).pull(&session).await.unwrap()
    };

    assert_eq!(report.up_to_date, 1);
    let logs = logs.contents();
    assert!(logs.contains("File already up to date"), "logs were: {logs}");
    assert!(logs.contains("notes.txt"));
    assert!(!logs.contains("Downloaded u-123/notes.txt"));
}

#[tokio::test]
async fn pull_downloads_when_mtime_differs() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    let local = root.join("notes.txt");
    fs::write(&local, b"0123456789").unwrap();
    set_mtime(&local, remote_time() - Duration::from_secs(60));

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/notes.txt", b"9876543210", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(gets(&store.calls().await), vec!["u-123/notes.txt"]);
    assert_eq!(report.downloaded, 1);
    assert_eq!(fs::read(&local).unwrap(), b"9876543210");
    assert_eq!(fs::metadata(&local).unwrap().modified().unwrap(), remote_time());
}

#[tokio::test]
async fn pull_downloads_when_size_differs() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    let local = root.join("notes.txt");
    fs::write(&local, b"short").unwrap();
    set_mtime(&local, remote_time());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/notes.txt", b"much longer body", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(fs::read(&local).unwrap(), b"much longer body");
}

#[tokio::test]
async fn pull_creates_parent_directories() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/a/b/c.txt", b"nested", remote_time()).await;
    engine_with(&store).pull(&session).await.unwrap();

    let local = session.user_root().join("a/b/c.txt");
    assert_eq!(fs::read(local).unwrap(), b"nested");
}

#[tokio::test]
async fn pull_follows_every_page() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::with_page_size(2));
    for i in 0..5 {
        store
            .insert(format!("u-123/file{i}.txt"), b"x", remote_time())
            .await;
    }
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.downloaded, 5);
    assert_eq!(lists(&store.calls().await), 3);
    for i in 0..5 {
        assert!(session.user_root().join(format!("file{i}.txt")).is_file());
    }
}

#[tokio::test]
async fn pull_ignores_other_namespaces() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-1234/theirs.txt", b"not mine", remote_time()).await;
    store.insert("u-123/", b"", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.directories_recreated, 0);
    assert_eq!(fs::read_dir(session.user_root()).unwrap().count(), 0);
}

#[tokio::test]
async fn pull_skips_keys_that_escape_the_root() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/../evil.txt", b"boom", remote_time()).await;
    store.insert("u-123/./dot.txt", b"boom", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.skipped, 2);
    assert!(gets(&store.calls().await).is_empty());
    assert!(!tmp.path().join("boxsync/evil.txt").exists());
}

#[tokio::test]
async fn pull_skips_directory_key_with_body() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());
    let docs = session.user_root().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("keep.txt"), b"keep").unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/docs/", b"not a marker", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.directories_recreated, 0);
    assert!(docs.join("keep.txt").is_file());
}

#[tokio::test]
async fn pull_records_failed_download_and_continues() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/a.txt", b"a", remote_time()).await;
    store.insert("u-123/b.txt", b"b", remote_time()).await;
    store.fail_on("u-123/a.txt").await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "a.txt");
    assert!(session.user_root().join("b.txt").is_file());
}

#[tokio::test]
async fn pull_aborts_when_listing_fails() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::new());
    store.fail_on("u-123/").await;
    let err = engine_with(&store).pull(&session).await.unwrap_err();

    assert!(matches!(err, SyncError::Transport(_)));
}

// ── Symlinks under the user root ────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn pull_replaces_symlinked_directory_without_touching_target() {
    let tmp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("secret.txt"), b"secret").unwrap();

    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(outside.path(), root.join("docs")).unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/docs/", b"", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.directories_recreated, 1);
    let docs = fs::symlink_metadata(root.join("docs")).unwrap();
    assert!(docs.is_dir());
    assert_eq!(fs::read_dir(root.join("docs")).unwrap().count(), 0);
    assert_eq!(fs::read(outside.path().join("secret.txt")).unwrap(), b"secret");
}

#[cfg(unix)]
#[tokio::test]
async fn pull_refuses_to_write_through_symlinked_parent() {
    let tmp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();

    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(outside.path(), root.join("docs")).unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/docs/planted.txt", b"planted", remote_time()).await;
    store.insert("u-123/ok.txt", b"ok", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "docs/planted.txt");
    assert!(!outside.path().join("planted.txt").exists());
    assert_eq!(gets(&store.calls().await), vec!["u-123/ok.txt"]);
    assert!(root.join("ok.txt").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn pull_refuses_to_overwrite_symlinked_file() {
    let tmp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let target = outside.path().join("target.txt");
    fs::write(&target, b"original").unwrap();

    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(&target, root.join("notes.txt")).unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/notes.txt", b"replaced", remote_time()).await;
    let report = engine_with(&store).pull(&session).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(fs::read(&target).unwrap(), b"original");
}

#[cfg(unix)]
#[tokio::test]
async fn push_walks_symlinked_user_root() {
    let tmp = TempDir::new().unwrap();
    let real = TempDir::new().unwrap();
    fs::write(real.path().join("notes.txt"), b"hello").unwrap();

    let session = session(tmp.path());
    let root = session.user_root();
    fs::create_dir_all(root.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(real.path(), &root).unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    let report = engine_with(&store).push(&session).await.unwrap();

    assert_eq!(report.uploaded, 1);
    assert_eq!(store.content("u-123/notes.txt").await.unwrap(), b"hello");
}

// ── Round trip ──────────────────────────────────────────────────

#[tokio::test]
async fn push_then_pull_reproduces_tree() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let pushing = session(source.path());
    let pulling = session(target.path());

    let root = pushing.user_root();
    fs::create_dir_all(root.join("docs/empty")).unwrap();
    fs::write(root.join("docs/report.txt"), b"quarterly").unwrap();
    fs::write(root.join("todo.txt"), b"ship it").unwrap();

    let store = Arc::new(MemoryObjectStore::new());
    let engine = engine_with(&store);
    engine.push(&pushing).await.unwrap();
    let report = engine.pull(&pulling).await.unwrap();

    let pulled = pulling.user_root();
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.directories_recreated, 2);
    assert!(pulled.join("docs/empty").is_dir());
    assert_eq!(fs::read(pulled.join("docs/report.txt")).unwrap(), b"quarterly");
    assert_eq!(fs::read(pulled.join("todo.txt")).unwrap(), b"ship it");

    // Files at the user root are current; files under a marker are
    // re-fetched because the marker recreates their directory first.
    store.clear_calls().await;
    let again = engine.pull(&pulling).await.unwrap();
    assert_eq!(again.up_to_date, 1);
    assert_eq!(gets(&store.calls().await), vec!["u-123/docs/report.txt"]);
}

#[tokio::test]
async fn second_pull_of_flat_tree_downloads_nothing() {
    let tmp = TempDir::new().unwrap();
    let session = session(tmp.path());

    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/a.txt", b"alpha", remote_time()).await;
    store.insert("u-123/b.txt", b"beta", remote_time()).await;
    let engine = engine_with(&store);
    engine.pull(&session).await.unwrap();

    store.clear_calls().await;
    let report = engine.pull(&session).await.unwrap();
    assert_eq!(report.up_to_date, 2);
    assert!(gets(&store.calls().await).is_empty());
}

// ── Remote directory helpers ────────────────────────────────────

#[tokio::test]
async fn valid_remote_directory_detects_children_and_markers() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/docs/a/b.txt", b"x", remote_time()).await;
    store.insert("u-123/empty/", b"", remote_time()).await;
    let engine = engine_with(&store);

    assert!(engine.is_valid_remote_directory("u-123/docs/").await.unwrap());
    assert!(engine.is_valid_remote_directory("u-123/empty/").await.unwrap());
    assert!(!engine.is_valid_remote_directory("u-123/missing/").await.unwrap());
}

#[tokio::test]
async fn remote_object_exists_is_exact() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/docs-archive/x", b"x", remote_time()).await;
    store.insert("u-123/notes.txt", b"x", remote_time()).await;
    let engine = engine_with(&store);

    assert!(engine.remote_object_exists("u-123/notes.txt").await.unwrap());
    assert!(!engine.remote_object_exists("u-123/docs").await.unwrap());
    assert!(!engine.remote_object_exists("u-123/notes").await.unwrap());
}

#[tokio::test]
async fn ensure_marker_is_idempotent() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = engine_with(&store);

    assert!(engine.ensure_marker("u-123/docs/").await.unwrap());
    assert!(!engine.ensure_marker("u-123/docs/").await.unwrap());
    assert_eq!(puts(&store.calls().await).len(), 1);
}

#[tokio::test]
async fn delete_remote_directory_sweeps_every_page() {
    let store = Arc::new(MemoryObjectStore::with_page_size(2));
    store.insert("u-123/docs/", b"", remote_time()).await;
    for i in 0..4 {
        store
            .insert(format!("u-123/docs/{i}.txt"), b"x", remote_time())
            .await;
    }
    store.insert("u-123/docs-archive/keep.txt", b"x", remote_time()).await;

    let sweep = engine_with(&store)
        .delete_remote_directory("u-123/docs/")
        .await
        .unwrap();

    assert_eq!(sweep.deleted, 5);
    assert_eq!(sweep.failed, 0);
    assert_eq!(store.keys().await, vec!["u-123/docs-archive/keep.txt"]);
}

#[tokio::test]
async fn delete_remote_directory_counts_failures() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("u-123/docs/a.txt", b"x", remote_time()).await;
    store.insert("u-123/docs/b.txt", b"x", remote_time()).await;
    store.fail_on("u-123/docs/a.txt").await;

    let sweep = engine_with(&store)
        .delete_remote_directory("u-123/docs/")
        .await
        .unwrap();

    assert_eq!(sweep.deleted, 1);
    assert_eq!(sweep.failed, 1);
    assert_eq!(store.keys().await, vec!["u-123/docs/a.txt"]);
}

#[tokio::test]
async fn delete_remote_directory_rejects_empty_prefix() {
    let store = Arc::new(MemoryObjectStore::new());
    let err = engine_with(&store)
        .delete_remote_directory("")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidArgument(_)));
}
