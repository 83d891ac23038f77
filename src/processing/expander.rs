//! Optional post-processing of freshly created notes.

use crate::llm::prompts::fill;
use crate::vault::naming::{frontmatter_title, heading_title};
use crate::vault::{NoteHandle, StorageError, Vault};
use async_trait::async_trait;
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

/// Errors raised by a template expander.
#[derive(Debug, Error)]
pub enum ExpansionError {
    /// Note could not be read or rewritten.
    #[error("Template expansion failed: {0}")]
    Storage(#[from] StorageError),
    /// Expander-specific failure.
    #[error("Template expansion failed: {0}")]
    Failed(String),
}

/// Rewrites a created note in place, e.g. to resolve template placeholders.
#[async_trait]
pub trait TemplateExpander: Send + Sync {
    /// Expand `note` inside `vault`.
    async fn expand(&self, vault: &dyn Vault, note: &NoteHandle) -> Result<(), ExpansionError>;
}

/// Resolves `{{title}}`, `{{date}}` and `{{time}}` left over from the template.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderExpander;

#[async_trait]
impl TemplateExpander for PlaceholderExpander {
    async fn expand(&self, vault: &dyn Vault, note: &NoteHandle) -> Result<(), ExpansionError> {
        let content = vault.read(note.path()).await?;
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let date = now
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|error| ExpansionError::Failed(error.to_string()))?;
        let time = now
            .format(format_description!("[hour]:[minute]"))
            .map_err(|error| ExpansionError::Failed(error.to_string()))?;
        let title = note_title(&content, note);

        let expanded = fill(
            &content,
            &[
                ("title", title.as_str()),
                ("date", date.as_str()),
                ("time", time.as_str()),
            ],
        );
        if expanded != content {
            vault.overwrite(note, &expanded).await?;
            tracing::debug!(path = note.path(), "Expanded template placeholders");
        }
        Ok(())
    }
}

/// Title written into the note, else its first heading. The file stem is the last resort,
/// since it carries collision suffixes and sanitized separators.
fn note_title(content: &str, note: &NoteHandle) -> String {
    let concrete = |title: &String| !title.contains("{{");
    frontmatter_title(content)
        .filter(concrete)
        .or_else(|| heading_title(content).filter(concrete))
        .unwrap_or_else(|| {
            let name = note.path().rsplit('/').next().unwrap_or(note.path());
            name.strip_suffix(".md").unwrap_or(name).replace('_', " ")
        })
}
