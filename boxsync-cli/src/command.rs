//! Shell command parsing.

use std::fmt;
use thiserror::Error;

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mkdir(String),
    Cd(String),
    /// Empty path lists the current directory.
    Ls(String),
    Rm(String),
    Push,
    Pull,
    ChangeRoot(String),
    Pwd,
    Help,
    Exit,
}

/// Errors from [`Command::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not recognized as a command. Type 'help' for a list of commands.")]
    Unknown(String),
}

impl Command {
    /// Parses a line. Blank lines yield `None`.
    ///
    /// The first word picks the command (case-insensitive); the rest of the
    /// line, trimmed, is its argument, so paths may contain spaces.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let required = |usage: &'static str| {
            if arg.is_empty() {
                Err(ParseError::Usage(usage))
            } else {
                Ok(arg.to_string())
            }
        };

        let command = match word.to_lowercase().as_str() {
            "mkdir" => Command::Mkdir(required("mkdir <folder>")?),
            "cd" => Command::Cd(required("cd <directory>")?),
            "ls" => Command::Ls(arg.to_string()),
            "rm" => Command::Rm(required("rm <path>")?),
            "push" => Command::Push,
            "pull" => Command::Pull,
            "change_root" => Command::ChangeRoot(required("change_root <directory>")?),
            "pwd" => Command::Pwd,
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            _ => return Err(ParseError::Unknown(word.to_string())),
        };
        Ok(Some(command))
    }

    /// Returns true for commands that ask before running.
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, Command::Push | Command::Pull | Command::Rm(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Mkdir(arg) => write!(f, "mkdir {arg}"),
            Command::Cd(arg) => write!(f, "cd {arg}"),
            Command::Ls(arg) if arg.is_empty() => write!(f, "ls"),
            Command::Ls(arg) => write!(f, "ls {arg}"),
            Command::Rm(arg) => write!(f, "rm {arg}"),
            Command::Push => write!(f, "push"),
            Command::Pull => write!(f, "pull"),
            Command::ChangeRoot(arg) => write!(f, "change_root {arg}"),
            Command::Pwd => write!(f, "pwd"),
            Command::Help => write!(f, "help"),
            Command::Exit => write!(f, "exit"),
        }
    }
}

/// Text printed by `help`.
pub const HELP: &str = "\
Commands:
  mkdir <folder>           Create a folder locally and in the cloud
  cd <directory>           Change the working directory (/ for the root, .. to go up)
  ls [path]                List a local directory
  rm <path>                Delete a file or folder locally and in the cloud
  push                     Upload every local file and folder to the cloud
  pull                     Download every cloud file and folder
  change_root <directory>  Use a different local root directory
  pwd                      Print the working directory
  help                     Show this message
  exit                     Leave the shell";
