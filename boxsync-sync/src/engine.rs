//! Push and pull passes between a user's local root and their namespace.

use crate::error::{SyncError, SyncResult};
use crate::report::SyncReport;
use crate::session::Session;
use crate::walker::{
    EntryKind, LocalEntry, LocalTreeWalker, local_path, reject_symlinked_components, remove_tree,
};
use boxsync_cloud::{ListRequest, ObjectPager, ObjectStore, ObjectSummary};
use boxsync_types::{
    NamespaceRoot, SEPARATOR, is_directory_key, is_safe_relative, namespace_prefix, to_key,
    to_local_relative,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, info, warn};

/// Outcome of deleting every object under a remote prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteSweep {
    pub deleted: usize,
    pub failed: usize,
}

/// Sync engine bound to one object store.
///
/// Remote calls are issued one at a time; a pass holds no state beyond its
/// [`SyncReport`].
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Uploads the user's whole local tree.
    ///
    /// Every file is uploaded (overwriting the remote copy) and every
    /// directory gets a marker. The user root is created first if missing.
    /// A failed entry is recorded and the walk continues.
    pub async fn push(&self, session: &Session) -> SyncResult<SyncReport> {
        let root = session.user_root();
        let namespace = session.namespace();
        info!("Push started from {:?} ({})", root, self.store.provider_name());

        if fs::metadata(&root).await.is_err() {
            debug!("Creating missing user root {:?}", root);
            fs::create_dir_all(&root).await?;
        }

        let mut report = SyncReport::default();
        for entry in LocalTreeWalker::following_root_link(&root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error reading local tree under {:?}: {}", root, e);
                    report.record_failure(root.display().to_string(), e);
                    continue;
                }
            };
            if entry.is_root() {
                continue;
            }
            self.push_entry(namespace, &root, &entry, &mut report).await;
        }

        info!("Push completed: {}", report);
        Ok(report)
    }

    async fn push_entry(
        &self,
        namespace: &NamespaceRoot,
        root: &Path,
        entry: &LocalEntry,
        report: &mut SyncReport,
    ) {
        match entry.kind {
            EntryKind::Directory => {
                let key = to_key(namespace, &entry.relative_path, true);
                match self.store.put_marker(&key).await {
                    Ok(()) => {
                        debug!("Directory marker written: {}", key);
                        report.markers_written += 1;
                    }
                    Err(e) => {
                        warn!("Error creating directory {} in the cloud: {}", key, e);
                        report.record_failure(&entry.relative_path, e);
                    }
                }
            }
            EntryKind::File => {
                let key = to_key(namespace, &entry.relative_path, false);
                let content = match fs::read(local_path(root, &entry.relative_path)).await {
                    Ok(content) => content,
                    Err(e) => {
                        warn!("Error reading {}: {}", entry.relative_path, e);
                        report.record_failure(&entry.relative_path, e);
                        return;
                    }
                };
                match self.store.put_object(&key, &content).await {
                    Ok(()) => {
                        info!("Uploaded {} ({} bytes)", key, content.len());
                        report.uploaded += 1;
                        report.bytes_transferred += content.len() as u64;
                    }
                    Err(e) => {
                        warn!("Error uploading {}: {}", key, e);
                        report.record_failure(&entry.relative_path, e);
                    }
                }
            }
            EntryKind::Symlink => {
                debug!("Skipping symbolic link {}", entry.relative_path);
                report.skipped += 1;
            }
        }
    }

    /// Downloads the user's whole namespace, page by page.
    ///
    /// Directory markers wipe and recreate the matching local directory.
    /// Files are downloaded unless the local copy already has the same size
    /// and modified time (to the second). Nothing is written through a
    /// symbolic link below the user root. A failed listing aborts the pass;
    /// a failed entry is recorded and the pass continues.
    pub async fn pull(&self, session: &Session) -> SyncResult<SyncReport> {
        let root = session.user_root();
        let namespace = session.namespace();
        let prefix = namespace_prefix(namespace);
        info!("Pull started into {:?} ({})", root, self.store.provider_name());

        fs::create_dir_all(&root).await?;

        let mut report = SyncReport::default();
        let mut pager = ObjectPager::new(self.store.as_ref(), ListRequest::prefix(&prefix));
        while let Some(page) = pager.next_page().await? {
            debug!("Pull page with {} objects", page.objects.len());
            for object in &page.objects {
                self.pull_object(namespace, &root, object, &mut report).await;
            }
        }

        info!("Pull completed: {}", report);
        Ok(report)
    }

    async fn pull_object(
        &self,
        namespace: &NamespaceRoot,
        root: &Path,
        object: &ObjectSummary,
        report: &mut SyncReport,
    ) {
        let Some(relative) = to_local_relative(namespace, &object.key) else {
            warn!("Skipping key outside the namespace: {}", object.key);
            report.skipped += 1;
            return;
        };
        if relative.is_empty() {
            // Marker for the namespace root itself.
            return;
        }
        if !is_safe_relative(relative) {
            warn!("Skipping unsafe key {}", object.key);
            report.skipped += 1;
            return;
        }

        let local = local_path(root, relative);
        let is_directory = is_directory_key(&object.key);
        // A directory marker replaces a symlink at its own path; files never
        // write through one.
        if let Err(e) = reject_symlinked_components(root, relative, !is_directory).await {
            warn!("Refusing to write {:?} through a symbolic link: {}", local, e);
            report.record_failure(relative, e);
            return;
        }
        if is_directory {
            if !object.is_marker() {
                warn!(
                    "Skipping {}: directory key with a {} byte body",
                    object.key, object.size
                );
                report.skipped += 1;
                return;
            }
            match recreate_directory(&local).await {
                Ok(()) => {
                    info!("Directory recreated: {:?}", local);
                    report.directories_recreated += 1;
                }
                Err(e) => {
                    warn!("Error recreating directory {:?}: {}", local, e);
                    report.record_failure(relative, e);
                }
            }
            return;
        }

        match self.download_if_stale(object, &local).await {
            Ok(Some(bytes)) => {
                info!("Downloaded {} ({} bytes)", object.key, bytes);
                report.downloaded += 1;
                report.bytes_transferred += bytes;
            }
            Ok(None) => {
                info!("File already up to date: {:?}", local);
                report.up_to_date += 1;
            }
            Err(e) => {
                warn!("Error downloading {}: {}", object.key, e);
                report.record_failure(relative, e);
            }
        }
    }

    /// Returns the number of bytes written, or `None` if the local copy was
    /// already current and nothing was fetched.
    async fn download_if_stale(
        &self,
        object: &ObjectSummary,
        local: &Path,
    ) -> SyncResult<Option<u64>> {
        if let Ok(metadata) = fs::metadata(local).await
            && metadata.is_file()
            && metadata.len() == object.size
            && metadata
                .modified()
                .is_ok_and(|modified| same_second(modified, object.last_modified))
        {
            return Ok(None);
        }

        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }
        let data = self.store.get_object(&object.key).await?;
        fs::write(local, &data.content).await?;
        set_modified(local, object.last_modified).await?;
        Ok(Some(data.content.len() as u64))
    }

    /// Returns true if anything exists under the directory prefix `key`
    /// (which should end with `/`).
    pub async fn is_valid_remote_directory(&self, key: &str) -> SyncResult<bool> {
        let request = ListRequest::prefix(key)
            .with_delimiter(SEPARATOR.to_string())
            .with_max_keys(1);
        let page = self.store.list_objects(&request).await?;
        Ok(!page.is_empty())
    }

    /// Returns true if an object exists at exactly `key`.
    pub async fn remote_object_exists(&self, key: &str) -> SyncResult<bool> {
        let page = self
            .store
            .list_objects(&ListRequest::prefix(key).with_max_keys(1))
            .await?;
        Ok(page.objects.first().is_some_and(|object| object.key == key))
    }

    /// Writes a directory marker at `key` unless one already exists.
    ///
    /// Returns true if a marker was written.
    pub async fn ensure_marker(&self, key: &str) -> SyncResult<bool> {
        if self.remote_object_exists(key).await? {
            debug!("Directory marker already exists: {}", key);
            return Ok(false);
        }
        self.store.put_marker(key).await?;
        Ok(true)
    }

    /// Deletes every object whose key starts with `prefix`.
    ///
    /// Listing failures abort; a failed delete is logged and counted.
    pub async fn delete_remote_directory(&self, prefix: &str) -> SyncResult<RemoteSweep> {
        if prefix.is_empty() {
            return Err(SyncError::InvalidArgument(
                "refusing to delete an empty prefix".to_string(),
            ));
        }

        let mut sweep = RemoteSweep::default();
        let mut pager = ObjectPager::new(self.store.as_ref(), ListRequest::prefix(prefix));
        while let Some(page) = pager.next_page().await? {
            for object in &page.objects {
                match self.store.delete_object(&object.key).await {
                    Ok(()) => {
                        debug!("Deleted {}", object.key);
                        sweep.deleted += 1;
                    }
                    Err(e) => {
                        warn!("Error deleting {}: {}", object.key, e);
                        sweep.failed += 1;
                    }
                }
            }
        }

        info!("Deleted {} objects under {}", sweep.deleted, prefix);
        Ok(sweep)
    }
}

/// Replaces whatever is at `path` with a fresh empty directory.
async fn recreate_directory(path: &Path) -> SyncResult<()> {
    remove_tree(path).await?;
    fs::create_dir_all(path).await?;
    Ok(())
}

fn unix_seconds(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// Compares two timestamps at whole-second precision.
pub(crate) fn same_second(a: SystemTime, b: SystemTime) -> bool {
    match (unix_seconds(a), unix_seconds(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

async fn set_modified(path: &Path, modified: SystemTime) -> SyncResult<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        std::fs::OpenOptions::new()
            .write(true)
            .open(path)?
            .set_modified(modified)
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn same_second_ignores_sub_second_difference() {
        let base = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert!(same_second(base, base + Duration::from_millis(999)));
        assert!(!same_second(base, base + Duration::from_secs(1)));
    }

    #[test]
    fn pre_epoch_times_never_match() {
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert!(!same_second(before, before));
    }
}
