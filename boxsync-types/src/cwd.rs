//! Virtual working directory.
//!
//! The session's position is kept as a list of plain segments below the
//! namespace root. It never holds `.`, `..` or empty segments, so it can be
//! turned into a remote key prefix or a local path without further checks.

use crate::key::{SEPARATOR, to_key};
use crate::{Error, NamespaceRoot, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Directory under the configured root that holds every user's local mirror.
pub const LOCAL_NAMESPACE_DIR: &str = "boxsync";

/// A user-supplied path that passed the containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute (or root-relative) local path, lexically normalized.
    pub local: PathBuf,
    /// `/`-separated path relative to the user root; empty for the root itself.
    pub relative: String,
}

impl ResolvedPath {
    /// Returns true when the path is the user root itself.
    #[must_use]
    pub fn is_user_root(&self) -> bool {
        self.relative.is_empty()
    }
}

/// Current directory of a session, relative to the user's namespace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingDirectory {
    namespace: NamespaceRoot,
    username: String,
    segments: Vec<String>,
}

impl WorkingDirectory {
    /// Creates a working directory positioned at the namespace root.
    pub fn new(namespace: NamespaceRoot, username: impl Into<String>) -> Self {
        Self {
            namespace,
            username: username.into(),
            segments: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &NamespaceRoot {
        &self.namespace
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Segments below the namespace root, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true when positioned at the namespace root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The current location relative to the namespace root, `/`-joined.
    pub fn relative_path(&self) -> String {
        self.segments.join("/")
    }

    /// Moves the working directory. Never fails and never climbs above the
    /// namespace root.
    ///
    /// `/` resets to the root, `..` pops one segment, and anything else is
    /// split on `/` and applied segment by segment (`.` and empty segments are
    /// ignored).
    pub fn change_directory(&mut self, token: &str) {
        match token {
            "/" => self.segments.clear(),
            ".." => {
                self.segments.pop();
            }
            _ => {
                for part in token.split(SEPARATOR) {
                    match part {
                        ".." => {
                            self.segments.pop();
                        }
                        "" | "." => {}
                        name => self.segments.push(name.to_string()),
                    }
                }
            }
        }
    }

    /// Remote key prefix of the current location: `ns/seg1/seg2`.
    pub fn full_remote_path(&self) -> String {
        let mut path = self.namespace.to_string();
        for segment in &self.segments {
            path.push(SEPARATOR);
            path.push_str(segment);
        }
        path
    }

    /// Directory marker key for the current location (`ns/seg1/seg2/`).
    pub fn remote_directory_key(&self) -> String {
        to_key(&self.namespace, &self.relative_path(), true)
    }

    /// Local mirror of the namespace root: `root/boxsync/<username>`.
    pub fn user_root(&self, root_directory: &Path) -> PathBuf {
        root_directory.join(LOCAL_NAMESPACE_DIR).join(&self.username)
    }

    /// Local mirror of the current location, shown as the shell prompt.
    pub fn local_prompt_path(&self, root_directory: &Path) -> PathBuf {
        let mut path = self.user_root(root_directory);
        path.extend(&self.segments);
        path
    }

    /// Resolves `target` (absolute, or relative to the prompt path) and checks
    /// that it stays inside the user root.
    ///
    /// The check is lexical only and performs no I/O. An empty target resolves
    /// to the current directory.
    pub fn resolve(&self, root_directory: &Path, target: &str) -> Result<ResolvedPath> {
        let user_root = normalize(&self.user_root(root_directory));
        let target_path = Path::new(target);
        let local = if target_path.is_absolute() {
            normalize(target_path)
        } else {
            normalize(&self.local_prompt_path(root_directory).join(target_path))
        };

        let relative = local
            .strip_prefix(&user_root)
            .map_err(|_| Error::PathEscape {
                path: target.to_string(),
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(ResolvedPath { local, relative })
    }
}

/// Lexically normalizes a path: drops `.`, lets `..` remove the previous
/// component, and never climbs above the filesystem root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}
