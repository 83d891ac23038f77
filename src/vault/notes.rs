//! Template lookup, collision-safe note creation and title enumeration.

use super::naming::{frontmatter_title, sanitize_file_name};
use super::storage::{NoteHandle, Vault};
use super::structure::VaultStructure;
use super::StorageError;
use std::collections::BTreeSet;
use std::sync::Arc;
use time::{OffsetDateTime, macros::format_description};

const BUILTIN_TEMPLATE: &str = "---\ntitle: \"{{title}}\"\nkategorie: \"\"\nerstellt: {{date}}\ntags: []\n---\n\n# {{title}}\n\n## Inhalt\n\n## Verknüpfungen\n";

/// Upper bound for numeric suffixes tried before giving up on a name.
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Vault adapter used by the pipeline: templates in, notes out.
#[derive(Clone)]
pub struct NoteStore {
    vault: Arc<dyn Vault>,
    structure: Arc<VaultStructure>,
}

impl NoteStore {
    /// Combine a storage backend with the vault layout.
    pub fn new(vault: Arc<dyn Vault>, structure: Arc<VaultStructure>) -> Self {
        Self { vault, structure }
    }

    /// Underlying storage backend.
    pub fn vault(&self) -> &Arc<dyn Vault> {
        &self.vault
    }

    /// Vault layout used for lookups.
    pub fn structure(&self) -> &VaultStructure {
        &self.structure
    }

    /// Template content for `category`.
    ///
    /// Unknown categories and unreadable templates fall back to the fallback category's
    /// template, then to a bundled skeleton. Never fails.
    pub async fn load_template(&self, category: &str) -> String {
        let fallback = self.structure.fallback_category.as_str();
        for candidate in [category, fallback] {
            let Some(layout) = self.structure.category(candidate) else {
                tracing::debug!(category = candidate, "No template mapping for category");
                continue;
            };
            match self.vault.read(&layout.template).await {
                Ok(content) => {
                    tracing::debug!(category = candidate, template = %layout.template, "Loaded template");
                    return content;
                }
                Err(error) => {
                    tracing::warn!(category = candidate, template = %layout.template, %error, "Template unavailable");
                }
            }
        }
        tracing::warn!(category, "Using built-in template skeleton");
        BUILTIN_TEMPLATE.to_string()
    }

    /// Write `content` as a new note named after `title` inside `folder`.
    ///
    /// Missing folder segments are created in order and name collisions get `_1`, `_2`, …
    /// suffixes. If that fails for any reason, the note is written to the intake folder under
    /// a timestamped name instead; only a failure of that fallback is returned.
    pub async fn create_note(
        &self,
        content: &str,
        title: &str,
        folder: &str,
    ) -> Result<NoteHandle, StorageError> {
        let stem = sanitize_file_name(title);
        let folder = normalize_folder(folder);

        match self.write_unique(&folder, &stem, content).await {
            Ok(handle) => {
                tracing::info!(path = handle.path(), "Note created");
                Ok(handle)
            }
            Err(error) => {
                tracing::warn!(%error, folder = %folder, "Falling back to intake folder");
                let stamped = format!("{stem}_{}", timestamp());
                let intake = normalize_folder(&self.structure.intake_folder);
                let handle = self.write_unique(&intake, &stamped, content).await?;
                tracing::info!(path = handle.path(), "Note created in intake folder");
                Ok(handle)
            }
        }
    }

    async fn write_unique(
        &self,
        folder: &str,
        stem: &str,
        content: &str,
    ) -> Result<NoteHandle, StorageError> {
        self.ensure_folder(folder).await?;
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{stem}.md")
            } else {
                format!("{stem}_{attempt}.md")
            };
            let path = join(folder, &name);
            if self.vault.exists(&path).await? {
                continue;
            }
            match self.vault.write_new(&path, content).await {
                Ok(handle) => return Ok(handle),
                // Lost a race against another writer; try the next suffix.
                Err(StorageError::AlreadyExists(_)) => continue,
                Err(error) => return Err(error),
            }
        }
        Err(StorageError::AlreadyExists(join(folder, &format!("{stem}.md"))))
    }

    async fn ensure_folder(&self, folder: &str) -> Result<(), StorageError> {
        let mut current = String::new();
        for segment in folder.split('/') {
            current = join(&current, segment);
            if !self.vault.exists(&current).await? {
                tracing::debug!(folder = %current, "Creating folder");
                self.vault.create_dir(&current).await?;
            }
        }
        Ok(())
    }

    /// Titles of every note outside the template folder.
    ///
    /// A frontmatter `title:` wins over the file stem. Sorted and deduplicated.
    pub async fn list_note_titles(&self) -> Result<Vec<String>, StorageError> {
        let titles: BTreeSet<String> = self
            .collect_titles()
            .await?
            .into_iter()
            .map(|(_, title)| title)
            .collect();
        Ok(titles.into_iter().collect())
    }

    /// Like [`NoteStore::list_note_titles`], but titles of notes inside `folder` (or its
    /// subfolders) come first. Each group is sorted; a title appears once.
    pub async fn list_note_titles_near(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}/", normalize_folder(folder));
        let mut near = BTreeSet::new();
        let mut rest = BTreeSet::new();
        for (path, title) in self.collect_titles().await? {
            if prefix != "/" && path.starts_with(&prefix) {
                near.insert(title);
            } else {
                rest.insert(title);
            }
        }
        let far = rest.into_iter().filter(|title| !near.contains(title));
        let ordered: Vec<String> = near.iter().cloned().chain(far).collect();
        Ok(ordered)
    }

    async fn collect_titles(&self) -> Result<Vec<(String, String)>, StorageError> {
        let template_prefix = format!("{}/", normalize_folder(&self.structure.template_dir));
        let mut titles = Vec::new();

        for path in self.vault.markdown_files().await? {
            if path.starts_with(&template_prefix) {
                continue;
            }
            let from_frontmatter = match self.vault.read(&path).await {
                Ok(content) => frontmatter_title(&content),
                Err(error) => {
                    tracing::debug!(path = %path, %error, "Could not read note for title");
                    None
                }
            };
            let title = from_frontmatter.unwrap_or_else(|| file_stem(&path).to_string());
            if !title.is_empty() {
                titles.push((path, title));
            }
        }

        Ok(titles)
    }
}

fn normalize_folder(folder: &str) -> String {
    folder
        .replace('\\', "/")
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name)
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year][month][day]-[hour][minute][second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::FsVault;
    use std::path::Path;

    fn store(root: &Path) -> NoteStore {
        NoteStore::new(
            Arc::new(FsVault::new(root)),
            Arc::new(VaultStructure::default()),
        )
    }

    fn write(root: &Path, path: &str, content: &str) {
        let target = root.join(path);
        std::fs::create_dir_all(target.parent().expect("parent")).expect("dirs");
        std::fs::write(target, content).expect("write");
    }

    #[tokio::test]
    async fn load_template_uses_category_then_fallback_then_skeleton() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let skeleton = store.load_template("begriff").await;
        assert!(skeleton.contains("title:"));
        assert_eq!(skeleton, BUILTIN_TEMPLATE);

        write(dir.path(), "99_Templates/Begriff.md", "---\ntitle: \"\"\n---\n# Begriff\n");
        write(dir.path(), "99_Templates/Buch.md", "---\ntitle: \"\"\nautor: \"\"\n---\n");

        let begriff = store.load_template("begriff").await;
        assert!(begriff.contains("# Begriff"));
        assert!(store.load_template("buch").await.contains("autor"));
        assert_eq!(store.load_template("unbekannt").await, begriff);
        // Mapped category whose template file is missing.
        assert_eq!(store.load_template("zitat").await, begriff);
    }

    #[tokio::test]
    async fn create_note_builds_folders_and_suffixes_collisions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let first = store
            .create_note("eins", "Rekursion", "02_Wissen/Begriffe")
            .await
            .expect("first");
        assert_eq!(first.path(), "02_Wissen/Begriffe/Rekursion.md");

        let second = store
            .create_note("zwei", "Rekursion", "02_Wissen/Begriffe/")
            .await
            .expect("second");
        assert_eq!(second.path(), "02_Wissen/Begriffe/Rekursion_1.md");

        write(dir.path(), "02_Wissen/Begriffe/Rekursion_2.md", "existing");
        let third = store
            .create_note("drei", "Rekursion", "02_Wissen\\Begriffe")
            .await
            .expect("third");
        assert_eq!(third.path(), "02_Wissen/Begriffe/Rekursion_3.md");

        let stored = std::fs::read_to_string(dir.path().join("02_Wissen/Begriffe/Rekursion_1.md"))
            .expect("read");
        assert_eq!(stored, "zwei");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("02_Wissen/Begriffe/Rekursion_2.md"))
                .expect("read"),
            "existing"
        );
    }

    #[tokio::test]
    async fn create_note_falls_back_to_intake_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        // A file where a folder segment is expected makes the preferred location unusable.
        write(dir.path(), "Blockiert", "not a folder");
        let handle = store
            .create_note("inhalt", "Mein Titel", "Blockiert/Unterordner")
            .await
            .expect("fallback");
        assert!(handle.path().starts_with("00_Inbox/Mein_Titel_"), "{}", handle.path());
        assert!(handle.path().ends_with(".md"));

        let escaping = store
            .create_note("inhalt", "Ausbruch", "../../tmp")
            .await
            .expect("fallback for escaping path");
        assert!(escaping.path().starts_with("00_Inbox/Ausbruch_"));
    }

    #[tokio::test]
    async fn create_note_propagates_when_fallback_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        write(dir.path(), "00_Inbox", "intake blocked");
        write(dir.path(), "Blockiert", "not a folder");

        let result = store
            .create_note("inhalt", "Titel", "Blockiert/Unterordner")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn list_note_titles_prefers_frontmatter_and_skips_templates() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "99_Templates/Begriff.md", "---\ntitle: \"Vorlage\"\n---\n");
        write(dir.path(), "02_Wissen/Begriffe/rekursion.md", "---\ntitle: \"Rekursion\"\n---\n");
        write(dir.path(), "01_Projekte/Umzug.md", "# Umzug planen\n");
        write(dir.path(), "Start.md", "");

        let titles = store(dir.path()).list_note_titles().await.expect("titles");
        assert_eq!(titles, vec!["Rekursion", "Start", "Umzug"]);
    }

    #[tokio::test]
    async fn titles_near_a_folder_come_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "01_Projekte/Aufbau.md", "");
        write(dir.path(), "02_Wissen/Begriffe/Zustand.md", "");
        write(dir.path(), "02_Wissen/Begriffe/Alt/Yak.md", "");
        write(dir.path(), "04_Ideen/Zustand.md", "");

        let titles = store(dir.path())
            .list_note_titles_near("02_Wissen/Begriffe/")
            .await
            .expect("titles");
        assert_eq!(titles, vec!["Yak", "Zustand", "Aufbau"]);
    }

    #[test]
    fn normalize_folder_drops_empty_segments() {
        assert_eq!(normalize_folder("/02_Wissen//Begriffe/"), "02_Wissen/Begriffe");
        assert_eq!(normalize_folder(" 03_Quellen \\ Zitate "), "03_Quellen/Zitate");
        assert_eq!(normalize_folder(""), "");
    }
}
