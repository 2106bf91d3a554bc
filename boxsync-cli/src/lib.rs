//! Interactive shell for boxsync.
//!
//! Parses command lines, asks for confirmation before anything destructive,
//! and dispatches to the sync engine and directory operations. Configuration
//! loading and startup helpers live here too so the binary stays thin.

pub mod command;
pub mod config;
pub mod shell;
pub mod startup;

pub use command::{Command, ParseError};
pub use config::CliConfig;
pub use shell::Shell;
pub use startup::{resolve_root_directory, validate_username};
