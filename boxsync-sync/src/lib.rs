//! Local/remote sync engine for boxsync.
//!
//! Mirrors a user's local directory tree with their namespace in an object
//! store.
//!
//! # Components
//!
//! - **Session**: who is syncing, where their local root is, and the current
//!   working directory
//! - **Walker**: lazy depth-first enumeration of a local subtree, plus
//!   children-first recursive deletion
//! - **Engine**: push (local → remote) and pull (remote → local) passes
//! - **Ops**: `mkdir`, `rm`, `ls`, `cd` and `change_root`, each guarded by the
//!   containment check before any I/O
//!
//! # Semantics
//!
//! Push uploads every local file and writes a marker for every directory,
//! overwriting whatever is remote (last writer wins). Pull walks the full
//! remote listing; directory markers wipe and recreate the local directory,
//! and files are only downloaded when their size or modified time differ.
//! Per-entry failures are logged and collected in a [`SyncReport`] instead of
//! aborting the pass.

mod engine;
mod error;
mod ops;
mod report;
mod session;
pub mod walker;

pub use engine::{RemoteSweep, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use ops::{DirectoryOps, MkdirOutcome, RemoveOutcome};
pub use report::{SyncFailure, SyncReport};
pub use session::Session;
pub use walker::{
    EntryKind, LocalEntry, LocalTreeWalker, reject_symlinked_components, remove_tree,
};
