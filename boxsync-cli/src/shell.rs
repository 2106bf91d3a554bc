//! The interactive read-eval-print loop.

use crate::command::{Command, HELP};
use boxsync_cloud::{PreferenceStore, ROOT_DIRECTORY_KEY};
use boxsync_sync::{DirectoryOps, Session, SyncEngine};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{debug, warn};

/// A shell bound to one session, reading commands from `R` and writing to `W`.
pub struct Shell<R, W> {
    session: Session,
    engine: Arc<SyncEngine>,
    ops: DirectoryOps,
    preferences: Option<PreferenceStore>,
    lines: Lines<R>,
    output: W,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(session: Session, engine: Arc<SyncEngine>, input: R, output: W) -> Self {
        Self {
            session,
            ops: DirectoryOps::new(engine.clone()),
            engine,
            preferences: None,
            lines: input.lines(),
            output,
        }
    }

    /// Persists `change_root` choices through `preferences`.
    #[must_use]
    pub fn with_preferences(mut self, preferences: PreferenceStore) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs until `exit`, `quit` or end of input.
    pub async fn run(&mut self) -> io::Result<()> {
        self.say("Type 'help' for a list of commands.").await?;
        loop {
            let prompt = format!("{}> ", self.session.prompt_path().display());
            self.write(&prompt).await?;

            let Some(line) = self.lines.next_line().await? else {
                self.say("").await?;
                break;
            };
            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Exit)) => break,
                Ok(Some(command)) => self.execute(command).await?,
                Err(e) => self.say(&e.to_string()).await?,
            }
        }
        Ok(())
    }

    /// Runs one command, printing its result or error.
    pub async fn execute(&mut self, command: Command) -> io::Result<()> {
        debug!("Executing {}", command);
        if command.needs_confirmation() && !self.confirm(&confirmation_question(&command)).await? {
            return self.say("Cancelled.").await;
        }

        match command {
            Command::Mkdir(folder) => match self.ops.mkdir(&self.session, &folder).await {
                Ok(outcome) => {
                    let message = match (outcome.remote_created, outcome.local_created) {
                        (false, false) => format!("{folder} already exists"),
                        _ => format!("Created {folder}"),
                    };
                    self.say(&message).await
                }
                Err(e) => self.report_error(e).await,
            },
            Command::Cd(path) => match self.ops.cd(&mut self.session, &path).await {
                Ok(()) => Ok(()),
                Err(e) => self.report_error(e).await,
            },
            Command::Ls(path) => match self.ops.ls(&self.session, &path).await {
                Ok(names) => {
                    for name in names {
                        self.say(&name).await?;
                    }
                    Ok(())
                }
                Err(e) => self.report_error(e).await,
            },
            Command::Rm(path) => match self.ops.rm(&self.session, &path).await {
                Ok(outcome) => {
                    let message = format!(
                        "Deleted {path}: {} cloud objects, {} local entries",
                        outcome.remote.deleted, outcome.local_removed
                    );
                    self.say(&message).await
                }
                Err(e) => self.report_error(e).await,
            },
            Command::Push => match self.engine.push(&self.session).await {
                Ok(report) => self.say(&format!("Push complete: {report}")).await,
                Err(e) => self.report_error(e).await,
            },
            Command::Pull => match self.engine.pull(&self.session).await {
                Ok(report) => self.say(&format!("Pull complete: {report}")).await,
                Err(e) => self.report_error(e).await,
            },
            Command::ChangeRoot(path) => self.change_root(&path).await,
            Command::Pwd => {
                let path = self.session.prompt_path();
                self.say(&path.display().to_string()).await
            }
            Command::Help => self.say(HELP).await,
            Command::Exit => Ok(()),
        }
    }

    async fn change_root(&mut self, path: &str) -> io::Result<()> {
        let user_root = match self.ops.change_root(&mut self.session, path).await {
            Ok(user_root) => user_root,
            Err(e) => return self.report_error(e).await,
        };

        if let Some(preferences) = &self.preferences {
            let root = self.session.root_directory().display().to_string();
            if let Err(e) = preferences
                .save(self.session.namespace(), ROOT_DIRECTORY_KEY, &root)
                .await
            {
                warn!("Could not save root directory preference: {}", e);
            }
        }
        self.say(&format!("Root directory is now {}", user_root.display()))
            .await
    }

    /// Asks a y/n question; anything but `y` is a no.
    async fn confirm(&mut self, question: &str) -> io::Result<bool> {
        self.write(&format!("{question} (y/n) ")).await?;
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }

    async fn report_error(&mut self, err: impl std::fmt::Display) -> io::Result<()> {
        self.say(&format!("Error: {err}")).await
    }

    async fn say(&mut self, text: &str) -> io::Result<()> {
        self.write(text).await?;
        self.write("\n").await
    }

    async fn write(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await
    }
}

fn confirmation_question(command: &Command) -> String {
    match command {
        Command::Push => {
            "Push will overwrite files in the cloud with your local files. Continue?".to_string()
        }
        Command::Pull => {
            "Pull will overwrite local files with the files in the cloud. Continue?".to_string()
        }
        Command::Rm(path) => format!("Delete {path} locally and in the cloud?"),
        _ => String::new(),
    }
}
