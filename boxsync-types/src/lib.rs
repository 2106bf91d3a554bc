//! Core type definitions for boxsync.
//!
//! This crate defines the pure, I/O-free types shared by the sync engine and
//! the shell:
//! - Namespace roots (the per-user key prefix inside a shared bucket)
//! - The virtual working directory and its containment check
//! - The mapping between relative paths and remote object keys
//!
//! Nothing here touches the filesystem or the network; the containment check
//! is purely lexical so it can run before any I/O is attempted.

mod cwd;
mod key;
mod namespace;

pub use cwd::{LOCAL_NAMESPACE_DIR, ResolvedPath, WorkingDirectory};
pub use key::{SEPARATOR, is_directory_key, is_safe_relative, namespace_prefix, to_key, to_local_relative};
pub use namespace::NamespaceRoot;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid namespace root: {0:?}")]
    InvalidNamespace(String),

    #[error("path escapes the user root: {path}")]
    PathEscape { path: String },
}
