//! Result records and error definitions for the note pipeline.

use crate::{
    llm::{LinkSuggestions, LlmError, QueryArtifacts},
    vault::{NoteHandle, StorageError},
};
use serde::Serialize;
use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Wrapped errors are transparent so the message shown to the user is the underlying one.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Nothing to process.
    #[error("No text provided")]
    EmptyInput,
    /// A model request failed or the credential is missing.
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// The vault could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Note produced by a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedNote {
    /// Normalized category the model assigned.
    pub content_type: String,
    /// Title extracted from the generated note.
    pub title: String,
    /// Handle of the created file.
    pub file: NoteHandle,
    /// Vault-relative path of the created file.
    pub path: String,
    /// Related-note suggestions; empty when the step degraded.
    pub link_suggestions: LinkSuggestions,
    /// Indexing add-on queries; empty when the step degraded.
    pub queries: QueryArtifacts,
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessingResult {
    /// The note was created.
    Success(ProcessedNote),
    /// The run aborted before a note was created.
    Failure {
        /// Display message of the aborting error.
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl ProcessingResult {
    /// Failure record carrying `error`'s display message.
    pub fn failure(error: &ProcessingError) -> Self {
        Self::Failure {
            error_message: error.to_string(),
        }
    }

    /// Created note, if the run succeeded.
    pub fn note(&self) -> Option<&ProcessedNote> {
        match self {
            Self::Success(note) => Some(note),
            Self::Failure { .. } => None,
        }
    }

    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Result plus the rendered report when the settings ask for one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// Pipeline result.
    pub result: ProcessingResult,
    /// Markdown summary, present when `create_summary_report` is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    /// All generated queries as one copyable block; absent when there are none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries: Option<String>,
}

/// Category assigned by the classification step alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Normalized category.
    pub category: String,
    /// Whether the vault layout knows the category.
    pub known: bool,
    /// Folder notes of this category go to by default.
    pub default_folder: String,
}
