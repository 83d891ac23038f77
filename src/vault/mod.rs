//! Vault access: folder layout, filesystem storage, and note creation.

pub mod naming;
mod notes;
pub mod storage;
pub mod structure;

pub use naming::{PLACEHOLDER_TITLE, extract_title, sanitize_file_name};
pub use notes::NoteStore;
pub use storage::{FsVault, NoteHandle, Vault};
pub use structure::{CategoryLayout, VaultStructure};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading from or writing to the vault.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("Vault I/O failed for {path}: {source}")]
    Io {
        /// Vault-relative path involved in the failing operation.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A note with the requested name is already present.
    #[error("Note already exists: {0}")]
    AlreadyExists(String),
    /// Requested path is absolute or escapes the vault root.
    #[error("Path is outside the vault: {0}")]
    OutsideVault(String),
    /// Requested file does not exist.
    #[error("Not found in vault: {0}")]
    NotFound(String),
    /// Vault structure overrides could not be parsed.
    #[error("Invalid vault structure file {path}: {source}")]
    InvalidStructure {
        /// Override file that failed to load.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}
