//! Storage backend abstraction and the filesystem implementation.
//!
//! All paths crossing this boundary are vault-relative and `/`-separated. The backend decides
//! how they map onto real storage; the rest of the crate only ever holds [`NoteHandle`]s.

use super::StorageError;
use async_trait::async_trait;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// Opaque reference to a note stored in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NoteHandle {
    path: String,
}

impl NoteHandle {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Vault-relative path of the note.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Storage operations the pipeline needs from the vault host.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Read a file as UTF-8 text.
    async fn read(&self, path: &str) -> Result<String, StorageError>;

    /// Whether a file or folder exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Create a single folder; its parent must already exist.
    async fn create_dir(&self, path: &str) -> Result<(), StorageError>;

    /// Create a new file, failing with [`StorageError::AlreadyExists`] if one is present.
    async fn write_new(&self, path: &str, content: &str) -> Result<NoteHandle, StorageError>;

    /// Replace the content of an existing note.
    async fn overwrite(&self, handle: &NoteHandle, content: &str) -> Result<(), StorageError>;

    /// Every markdown file in the vault, hidden entries excluded.
    async fn markdown_files(&self) -> Result<Vec<String>, StorageError>;

    /// Location of the note outside the vault abstraction, when the backend has one.
    fn locate(&self, handle: &NoteHandle) -> Option<PathBuf>;
}

/// Vault stored as a plain directory tree.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Serve the vault rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::OutsideVault(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

fn io_error(path: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| match source.kind() {
        ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
        ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_string()),
        _ => StorageError::Io {
            path: path.to_string(),
            source,
        },
    }
}

#[async_trait]
impl Vault for FsVault {
    async fn read(&self, path: &str) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::read_to_string(&target).await.map_err(io_error(path))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::try_exists(&target).await.map_err(io_error(path))
    }

    async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::create_dir(&target).await {
            Err(err) if err.kind() == ErrorKind::AlreadyExists && target.is_dir() => Ok(()),
            other => other.map_err(io_error(path)),
        }
    }

    async fn write_new(&self, path: &str, content: &str) -> Result<NoteHandle, StorageError> {
        let target = self.resolve(path)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(io_error(path))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(io_error(path))?;
        file.flush().await.map_err(io_error(path))?;
        tracing::debug!(path, bytes = content.len(), "Created vault file");
        Ok(NoteHandle::new(path))
    }

    async fn overwrite(&self, handle: &NoteHandle, content: &str) -> Result<(), StorageError> {
        let target = self.resolve(handle.path())?;
        if !tokio::fs::try_exists(&target)
            .await
            .map_err(io_error(handle.path()))?
        {
            return Err(StorageError::NotFound(handle.path().to_string()));
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(io_error(handle.path()))
    }

    async fn markdown_files(&self) -> Result<Vec<String>, StorageError> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || collect_markdown(&root))
            .await
            .map_err(|error| StorageError::Io {
                path: String::new(),
                source: std::io::Error::other(error),
            })?;
        Ok(files)
    }

    fn locate(&self, handle: &NoteHandle) -> Option<PathBuf> {
        self.resolve(handle.path()).ok()
    }
}

fn collect_markdown(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::debug!(%error, "Skipping unreadable vault entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            let segments: Vec<String> = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(segments.join("/"));
        }
    }

    files.sort();
    files
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
