//! Opening created notes in the user's editor.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Shows a created note to the user.
#[async_trait]
pub trait NoteOpener: Send + Sync {
    /// Open the file at `path`.
    async fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// Launches an external editor command with the note path as its last argument.
#[derive(Debug, Clone)]
pub struct EditorOpener {
    command: String,
    wait: bool,
}

impl EditorOpener {
    /// Use `command` when given, else `$VISUAL`, then `$EDITOR`, then `vi`.
    ///
    /// With `wait` the call returns once the editor exits; otherwise it is left running.
    pub fn new(command: Option<String>, wait: bool) -> Self {
        let command = command
            .filter(|command| !command.trim().is_empty())
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .filter(|command| !command.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string());
        Self { command, wait }
    }

    fn build(&self, path: &Path) -> std::io::Result<Command> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty open command")
        })?;
        let mut command = Command::new(program);
        command.args(parts).arg(path);
        Ok(command)
    }
}

#[async_trait]
impl NoteOpener for EditorOpener {
    async fn open(&self, path: &Path) -> std::io::Result<()> {
        tracing::debug!(command = %self.command, path = %path.display(), "Opening note");
        let mut command = self.build(path)?;
        if self.wait {
            let status = command.status().await?;
            if !status.success() {
                return Err(std::io::Error::other(format!(
                    "`{}` exited with {status}",
                    self.command
                )));
            }
        } else {
            command.spawn()?;
        }
        Ok(())
    }
}
