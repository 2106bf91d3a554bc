//! The per-user session context.

use crate::error::SyncResult;
use boxsync_types::{NamespaceRoot, ResolvedPath, WorkingDirectory};
use std::path::{Path, PathBuf};

/// Everything an operation needs to know about the active user.
///
/// Owned by the caller and passed to every engine and directory operation;
/// nothing in the sync layer keeps its own copy.
#[derive(Debug, Clone)]
pub struct Session {
    cwd: WorkingDirectory,
    root_directory: PathBuf,
}

impl Session {
    /// Starts a session at the namespace root.
    pub fn new(
        namespace: NamespaceRoot,
        username: impl Into<String>,
        root_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cwd: WorkingDirectory::new(namespace, username),
            root_directory: root_directory.into(),
        }
    }

    pub fn namespace(&self) -> &NamespaceRoot {
        self.cwd.namespace()
    }

    pub fn username(&self) -> &str {
        self.cwd.username()
    }

    /// The configured local root (parent of the `boxsync` directory).
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn set_root_directory(&mut self, root_directory: impl Into<PathBuf>) {
        self.root_directory = root_directory.into();
    }

    pub fn cwd(&self) -> &WorkingDirectory {
        &self.cwd
    }

    pub fn cwd_mut(&mut self) -> &mut WorkingDirectory {
        &mut self.cwd
    }

    /// Local mirror of the namespace root.
    pub fn user_root(&self) -> PathBuf {
        self.cwd.user_root(&self.root_directory)
    }

    /// Local mirror of the current directory.
    pub fn prompt_path(&self) -> PathBuf {
        self.cwd.local_prompt_path(&self.root_directory)
    }

    /// Runs the containment check on a user-supplied path.
    pub fn resolve(&self, target: &str) -> SyncResult<ResolvedPath> {
        Ok(self.cwd.resolve(&self.root_directory, target)?)
    }
}
