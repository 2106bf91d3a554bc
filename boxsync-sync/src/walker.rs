//! Local tree traversal.
//!
//! [`LocalTreeWalker`] yields a subtree lazily in depth-first pre-order,
//! parents before children, with siblings sorted by file name. Symbolic links
//! are reported as-is and never followed. That includes a root that is itself
//! a link, unless the walker is built with [`LocalTreeWalker::following_root_link`].

use crate::error::{SyncError, SyncResult};
use boxsync_types::SEPARATOR;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What kind of filesystem object an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One entry of a local walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// `/`-separated path relative to the walk root; empty for the root itself.
    pub relative_path: String,
    pub kind: EntryKind,
    /// Size in bytes (as reported by the filesystem for directories).
    pub size: u64,
    pub modified: SystemTime,
}

impl LocalEntry {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative_path.is_empty()
    }
}

/// Lazy, restartable-by-reconstruction walk of a local subtree.
///
/// The first entry is always the root itself. A missing root yields a single
/// error.
pub struct LocalTreeWalker {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl LocalTreeWalker {
    /// Walks `root` without following any link, the root included. A root
    /// that is a symlink yields a single [`EntryKind::Symlink`] entry.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::build(root.into(), false)
    }

    /// Walks the directory `root` points to when it is a symlink. Links below
    /// the root are still reported as-is.
    pub fn following_root_link(root: impl Into<PathBuf>) -> Self {
        Self::build(root.into(), true)
    }

    fn build(root: PathBuf, follow_root: bool) -> Self {
        let inner = WalkDir::new(&root)
            .follow_links(false)
            .follow_root_links(follow_root)
            .sort_by_file_name()
            .into_iter();
        Self { root, inner }
    }

    fn to_entry(&self, entry: &walkdir::DirEntry) -> SyncResult<LocalEntry> {
        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let metadata = entry.metadata()?;

        Ok(LocalEntry {
            relative_path: relative_to(&self.root, entry.path()),
            kind,
            size: metadata.len(),
            modified: metadata.modified()?,
        })
    }
}

impl Iterator for LocalTreeWalker {
    type Item = SyncResult<LocalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(err) => return Some(Err(SyncError::from(err))),
        };
        Some(self.to_entry(&entry))
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

/// Joins a `/`-separated relative path onto `root`.
pub fn local_path(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(relative.split(SEPARATOR).filter(|s| !s.is_empty()));
    path
}

/// Deletes `path` and everything below it, children before parents.
///
/// Walks the subtree, then removes entries in reverse walk order. Entries that
/// fail to delete are logged and skipped; their parents will then fail too.
/// Returns the number of entries removed. A missing path removes nothing, and
/// a `path` that is a symlink is unlinked without touching its target.
pub async fn remove_tree(path: &Path) -> SyncResult<usize> {
    if fs::symlink_metadata(path).await.is_err() {
        debug!("Nothing to remove at {:?}", path);
        return Ok(0);
    }

    let walk_root = path.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || {
        LocalTreeWalker::new(walk_root).collect::<SyncResult<Vec<_>>>()
    })
    .await
    .map_err(std::io::Error::other)??;

    let mut removed = 0usize;
    for entry in entries.iter().rev() {
        let target = local_path(path, &entry.relative_path);
        let result = if entry.is_dir() {
            fs::remove_dir(&target).await
        } else {
            fs::remove_file(&target).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to delete {:?}: {}", target, e),
        }
    }

    debug!("Removed {} entries under {:?}", removed, path);
    Ok(removed)
}

/// Fails with [`SyncError::PathEscape`] when a segment of the `/`-separated
/// `relative` path below `root` is a symbolic link. The last segment is
/// checked only when `include_leaf` is set. A segment that does not exist yet
/// ends the check.
pub async fn reject_symlinked_components(
    root: &Path,
    relative: &str,
    include_leaf: bool,
) -> SyncResult<()> {
    let segments: Vec<&str> = relative.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
    let checked = if include_leaf {
        segments.len()
    } else {
        segments.len().saturating_sub(1)
    };

    let mut current = root.to_path_buf();
    for segment in &segments[..checked] {
        current.push(segment);
        match fs::symlink_metadata(&current).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(SyncError::PathEscape(relative.to_string()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
