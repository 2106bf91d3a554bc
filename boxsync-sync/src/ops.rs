//! Shell-level directory operations.
//!
//! Every operation that takes a path runs it through the session's
//! containment check first; a path outside the user root is rejected before
//! any local or remote I/O.

use crate::engine::{RemoteSweep, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::session::Session;
use crate::walker::{reject_symlinked_components, remove_tree};
use boxsync_types::to_key;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// What `mkdir` actually created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MkdirOutcome {
    pub remote_created: bool,
    pub local_created: bool,
}

/// What `rm` actually deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Remote objects deleted (directory contents or the single file).
    pub remote: RemoteSweep,
    /// Local entries removed.
    pub local_removed: usize,
}

/// `mkdir`, `rm`, `ls`, `cd` and `change_root` over a session.
pub struct DirectoryOps {
    engine: Arc<SyncEngine>,
}

impl DirectoryOps {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    /// Creates a folder both remotely (as a marker) and locally.
    ///
    /// Either side that already exists is left alone.
    pub async fn mkdir(&self, session: &Session, folder: &str) -> SyncResult<MkdirOutcome> {
        let folder = folder.trim();
        if folder.is_empty() {
            return Err(SyncError::InvalidArgument("usage: mkdir <folder>".to_string()));
        }
        let resolved = session.resolve(folder)?;
        if resolved.is_user_root() {
            return Err(SyncError::InvalidArgument(format!(
                "{folder} is the root directory"
            )));
        }

        let key = to_key(session.namespace(), &resolved.relative, true);
        let remote_created = self.engine.ensure_marker(&key).await?;
        if remote_created {
            info!("Folder created in the cloud: {}", key);
        } else {
            info!("Folder already exists in the cloud: {}", key);
        }

        let local_created = match fs::metadata(&resolved.local).await {
            Ok(metadata) if metadata.is_dir() => {
                info!("Folder already exists locally: {:?}", resolved.local);
                false
            }
            _ => {
                fs::create_dir_all(&resolved.local).await?;
                info!("Folder created locally: {:?}", resolved.local);
                true
            }
        };

        Ok(MkdirOutcome {
            remote_created,
            local_created,
        })
    }

    /// Deletes a file or directory both remotely and locally.
    ///
    /// A directory is matched remotely by its `path/` prefix only, so sibling
    /// keys sharing a name prefix are untouched. Fails with `NotFound` when
    /// the path exists on neither side, in which case nothing is deleted.
    pub async fn rm(&self, session: &Session, path: &str) -> SyncResult<RemoveOutcome> {
        let path = path.trim();
        if path.is_empty() {
            return Err(SyncError::InvalidArgument("usage: rm <path>".to_string()));
        }
        let resolved = session.resolve(path)?;
        if resolved.is_user_root() {
            return Err(SyncError::InvalidArgument(
                "refusing to remove the root directory".to_string(),
            ));
        }
        reject_symlinked_components(&session.user_root(), &resolved.relative, false).await?;

        let namespace = session.namespace();
        let dir_key = to_key(namespace, &resolved.relative, true);
        let file_key = to_key(namespace, &resolved.relative, false);

        let remote_dir = self.engine.is_valid_remote_directory(&dir_key).await?;
        let remote_file = self.engine.remote_object_exists(&file_key).await?;
        let local_exists = fs::symlink_metadata(&resolved.local).await.is_ok();

        if !remote_dir && !remote_file && !local_exists {
            return Err(SyncError::NotFound(path.to_string()));
        }

        let mut outcome = RemoveOutcome::default();
        if remote_dir {
            outcome.remote = self.engine.delete_remote_directory(&dir_key).await?;
        }
        if remote_file {
            match self.engine.store().delete_object(&file_key).await {
                Ok(()) => outcome.remote.deleted += 1,
                Err(e) => {
                    warn!("Error deleting {}: {}", file_key, e);
                    outcome.remote.failed += 1;
                }
            }
        }
        if !remote_dir && !remote_file {
            info!("{} does not exist in the cloud", path);
        }

        if local_exists {
            outcome.local_removed = remove_tree(&resolved.local).await?;
            info!("Removed {} local entries at {:?}", outcome.local_removed, resolved.local);
        } else {
            info!("{} does not exist locally", path);
        }

        Ok(outcome)
    }

    /// Lists the names in a local directory, sorted. An empty path lists the
    /// current directory.
    pub async fn ls(&self, session: &Session, path: &str) -> SyncResult<Vec<String>> {
        let path = path.trim();
        let resolved = session.resolve(path)?;

        match fs::metadata(&resolved.local).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(SyncError::NotADirectory(display_target(path, &resolved.local))),
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&resolved.local).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Moves the session's working directory.
    ///
    /// `/` and `..` always succeed. Anything else must resolve inside the user
    /// root to an existing local directory.
    pub async fn cd(&self, session: &mut Session, path: &str) -> SyncResult<()> {
        let path = path.trim();
        match path {
            "" => Err(SyncError::InvalidArgument("usage: cd <directory>".to_string())),
            "/" | ".." => {
                session.cwd_mut().change_directory(path);
                Ok(())
            }
            _ => {
                let resolved = session.resolve(path)?;
                match fs::metadata(&resolved.local).await {
                    Ok(metadata) if metadata.is_dir() => {}
                    _ => return Err(SyncError::NotADirectory(path.to_string())),
                }
                let cwd = session.cwd_mut();
                cwd.change_directory("/");
                cwd.change_directory(&resolved.relative);
                debug!("Working directory is now /{}", cwd.relative_path());
                Ok(())
            }
        }
    }

    /// Points the session at a different local root and creates the user's
    /// mirror directory under it.
    ///
    /// The new root must be an existing directory. Returns the new user root.
    pub async fn change_root(&self, session: &mut Session, path: &str) -> SyncResult<PathBuf> {
        let path = path.trim();
        if path.is_empty() {
            return Err(SyncError::InvalidArgument(
                "usage: change_root <directory>".to_string(),
            ));
        }
        let new_root = PathBuf::from(path);
        match fs::metadata(&new_root).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(SyncError::NotADirectory(path.to_string())),
        }

        session.set_root_directory(new_root);
        let user_root = session.user_root();
        fs::create_dir_all(&user_root).await?;
        info!("Root directory changed; mirroring into {:?}", user_root);
        Ok(user_root)
    }
}

fn display_target(path: &str, local: &std::path::Path) -> String {
    if path.is_empty() {
        local.display().to_string()
    } else {
        path.to_string()
    }
}
