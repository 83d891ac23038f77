//! Persisted user settings.
//!
//! Settings live in a JSON file next to the vault. Loading merges whatever the file contains
//! over the bundled defaults; every mutation is written back immediately. Pipeline runs never
//! read the live value: they take a [`SettingsStore::snapshot`] once and keep it for the run.

use crate::config::parse_bool;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised while loading or persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read or written.
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Settings file exists but does not contain valid JSON.
    #[error("Settings file {path} is not valid JSON: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// Imported settings document is not valid JSON.
    #[error("Settings document is not valid JSON: {0}")]
    Document(#[source] serde_json::Error),
    /// Caller referenced a setting that does not exist.
    #[error("Unknown setting: {0}")]
    UnknownKey(String),
    /// Caller supplied a value that does not fit the setting.
    #[error("Invalid value for setting {key}: {value}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

/// User-facing settings shared by every pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Anthropic API key; empty means "not configured".
    pub api_key: String,
    /// Attach a rendered summary report to each run.
    pub create_summary_report: bool,
    /// Open the created note once the pipeline finishes.
    pub open_note_after_creation: bool,
    /// Prompt texts sent to the model.
    pub prompts: PromptSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            create_summary_report: true,
            open_note_after_creation: false,
            prompts: PromptSettings::default(),
        }
    }
}

/// Customizable prompt texts. `{{name}}` placeholders are filled per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// System prompt attached to every request.
    pub system_prompt: String,
    /// Classification prompt; receives `{{categories}}` and `{{text}}`.
    pub analyze_prompt: String,
    /// Structuring prompt; receives `{{category}}`, `{{template}}` and `{{text}}`.
    pub structure_prompt: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            system_prompt: "Du bist ein Assistent für persönliches Wissensmanagement. Du \
                ordnest Inhalte in ein Markdown-Vault ein und antwortest präzise, ohne \
                Einleitung und ohne Erklärungen."
                .into(),
            analyze_prompt: "Ordne den folgenden Inhalt genau einer dieser Kategorien zu: \
                {{categories}}.\nAntworte ausschließlich mit dem Namen der Kategorie.\n\n\
                Inhalt:\n{{text}}"
                .into(),
            structure_prompt: "Fülle die folgende Vorlage für die Kategorie \"{{category}}\" \
                mit dem Inhalt aus. Behalte das Frontmatter bei, setze einen passenden \
                Titel in das Feld title und gib nur das fertige Markdown zurück.\n\n\
                Vorlage:\n{{template}}\n\nInhalt:\n{{text}}"
                .into(),
        }
    }
}

impl Settings {
    /// Whether an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Copy suitable for display: the API key is reduced to its last four characters.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.api_key = mask_key(&self.api_key);
        copy
    }

    /// Assign a single setting from its textual form, as used by the CLI.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "api_key" => self.api_key = value.trim().to_string(),
            "create_summary_report" => {
                self.create_summary_report = parse_bool(value).ok_or_else(invalid)?
            }
            "open_note_after_creation" => {
                self.open_note_after_creation = parse_bool(value).ok_or_else(invalid)?
            }
            "system_prompt" => self.prompts.system_prompt = value.to_string(),
            "analyze_prompt" => self.prompts.analyze_prompt = value.to_string(),
            "structure_prompt" => self.prompts.structure_prompt = value.to_string(),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Restore one prompt (`system_prompt`, `analyze_prompt` or `structure_prompt`) to its
    /// bundled default.
    pub fn reset_prompt(&mut self, key: &str) -> Result<(), SettingsError> {
        let defaults = PromptSettings::default();
        match key {
            "system_prompt" => self.prompts.system_prompt = defaults.system_prompt,
            "analyze_prompt" => self.prompts.analyze_prompt = defaults.analyze_prompt,
            "structure_prompt" => self.prompts.structure_prompt = defaults.structure_prompt,
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Full settings as pretty JSON, API key included, suitable for [`Settings::import`].
    pub fn export(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(SettingsError::Document)
    }

    /// Replace these settings with an exported document.
    ///
    /// Fields missing from the document take their defaults. A document without an API key
    /// keeps the current one.
    pub fn import(&mut self, document: &str) -> Result<(), SettingsError> {
        let mut imported: Settings =
            serde_json::from_str(document).map_err(SettingsError::Document)?;
        if !imported.has_api_key() {
            imported.api_key = std::mem::take(&mut self.api_key);
        }
        *self = imported;
        Ok(())
    }
}

fn mask_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let tail: String = trimmed
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}

/// Partial update applied through the HTTP settings surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    /// New API key.
    pub api_key: Option<String>,
    /// New report toggle.
    pub create_summary_report: Option<bool>,
    /// New open-after-creation toggle.
    pub open_note_after_creation: Option<bool>,
    /// New system prompt.
    pub system_prompt: Option<String>,
    /// New classification prompt.
    pub analyze_prompt: Option<String>,
    /// New structuring prompt.
    pub structure_prompt: Option<String>,
}

impl SettingsPatch {
    /// Apply every provided field to `settings`.
    pub fn apply(self, settings: &mut Settings) {
        if let Some(api_key) = self.api_key {
            settings.api_key = api_key.trim().to_string();
        }
        if let Some(flag) = self.create_summary_report {
            settings.create_summary_report = flag;
        }
        if let Some(flag) = self.open_note_after_creation {
            settings.open_note_after_creation = flag;
        }
        if let Some(prompt) = self.system_prompt {
            settings.prompts.system_prompt = prompt;
        }
        if let Some(prompt) = self.analyze_prompt {
            settings.prompts.analyze_prompt = prompt;
        }
        if let Some(prompt) = self.structure_prompt {
            settings.prompts.structure_prompt = prompt;
        }
    }
}

/// Owner of the live settings value and its backing file.
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Load settings from `path`, merging the file over defaults.
    ///
    /// A missing file yields defaults. `env_api_key` fills the key when none is stored.
    pub async fn load(path: &Path, env_api_key: Option<String>) -> Result<Self, SettingsError> {
        let mut settings = match tokio::fs::read_to_string(path).await {
            Ok(raw) if raw.trim().is_empty() => Settings::default(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file; using defaults");
                Settings::default()
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if !settings.has_api_key() {
            if let Some(key) = env_api_key.filter(|key| !key.trim().is_empty()) {
                settings.api_key = key.trim().to_string();
            }
        }

        tracing::debug!(
            path = %path.display(),
            has_api_key = settings.has_api_key(),
            "Loaded settings"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            current: RwLock::new(settings),
        })
    }

    /// Build a store that keeps settings in memory only.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            current: RwLock::new(settings),
        }
    }

    /// Clone the current settings for a single pipeline run.
    pub async fn snapshot(&self) -> Settings {
        self.current.read().await.clone()
    }

    /// Mutate settings and persist the result. Returns the updated value.
    pub async fn update<F>(&self, change: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings) -> Result<(), SettingsError>,
    {
        let mut guard = self.current.write().await;
        let mut next = guard.clone();
        change(&mut next)?;
        self.persist(&next).await?;
        *guard = next.clone();
        tracing::info!(has_api_key = next.has_api_key(), "Settings updated");
        Ok(next)
    }

    async fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let io_error = |source| SettingsError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let body = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Parse {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(path, body).await.map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults_seeded_with_env_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load(&path, Some(" sk-env ".into()))
            .await
            .expect("load");
        let settings = store.snapshot().await;
        assert_eq!(settings.api_key, "sk-env");
        assert!(settings.create_summary_report);
        assert_eq!(settings.prompts, PromptSettings::default());
    }

    #[tokio::test]
    async fn partial_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"api_key":"sk-file","prompts":{"system_prompt":"custom"}}"#,
        )
        .expect("write");

        let store = SettingsStore::load(&path, Some("sk-env".into()))
            .await
            .expect("load");
        let settings = store.snapshot().await;
        assert_eq!(settings.api_key, "sk-file");
        assert_eq!(settings.prompts.system_prompt, "custom");
        assert_eq!(
            settings.prompts.analyze_prompt,
            PromptSettings::default().analyze_prompt
        );
    }

    #[tokio::test]
    async fn update_persists_and_snapshot_is_detached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::load(&path, None).await.expect("load");

        let before = store.snapshot().await;
        store
            .update(|settings| settings.set_value("open_note_after_creation", "true"))
            .await
            .expect("update");

        assert!(!before.open_note_after_creation);
        assert!(store.snapshot().await.open_note_after_creation);

        let reloaded = SettingsStore::load(&path, None).await.expect("reload");
        assert!(reloaded.snapshot().await.open_note_after_creation);
    }

    #[tokio::test]
    async fn rejected_update_leaves_settings_untouched() {
        let store = SettingsStore::in_memory(Settings::default());
        let error = store
            .update(|settings| settings.set_value("create_summary_report", "sometimes"))
            .await
            .expect_err("invalid bool");
        assert!(matches!(error, SettingsError::InvalidValue { .. }));
        assert!(store.snapshot().await.create_summary_report);

        let error = store
            .update(|settings| settings.set_value("colour", "blue"))
            .await
            .expect_err("unknown key");
        assert!(matches!(error, SettingsError::UnknownKey(key) if key == "colour"));
    }

    #[tokio::test]
    async fn reset_prompt_restores_default_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load(&path, None).await.expect("load");
        store
            .update(|settings| settings.set_value("analyze_prompt", "eigener Prompt"))
            .await
            .expect("customize");

        store
            .update(|settings| settings.reset_prompt("analyze_prompt"))
            .await
            .expect("reset");

        let reloaded = SettingsStore::load(&path, None).await.expect("reload");
        assert_eq!(
            reloaded.snapshot().await.prompts.analyze_prompt,
            PromptSettings::default().analyze_prompt
        );

        let error = store
            .update(|settings| settings.reset_prompt("api_key"))
            .await
            .expect_err("not a prompt");
        assert!(matches!(error, SettingsError::UnknownKey(_)));
    }

    #[tokio::test]
    async fn export_then_import_restores_settings_into_another_store() {
        let source = Settings {
            api_key: "sk-exported".into(),
            create_summary_report: false,
            prompts: PromptSettings {
                system_prompt: "exportiert".into(),
                ..PromptSettings::default()
            },
            ..Settings::default()
        };
        let document = source.export().expect("export");
        assert!(document.contains("\"sk-exported\""));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let target = SettingsStore::load(&path, None).await.expect("load");
        target
            .update(|settings| settings.import(&document))
            .await
            .expect("import");

        let reloaded = SettingsStore::load(&path, None).await.expect("reload");
        assert_eq!(reloaded.snapshot().await, source);
    }

    #[test]
    fn import_keeps_current_key_and_rejects_garbage() {
        let mut settings = Settings {
            api_key: "sk-current".into(),
            ..Settings::default()
        };
        settings
            .import(r#"{"open_note_after_creation": true}"#)
            .expect("import");
        assert_eq!(settings.api_key, "sk-current");
        assert!(settings.open_note_after_creation);
        assert!(settings.create_summary_report);

        let error = settings.import("kein json").expect_err("garbage");
        assert!(matches!(error, SettingsError::Document(_)));
        assert_eq!(settings.api_key, "sk-current");
    }

    #[test]
    fn masked_keeps_only_key_tail() {
        let settings = Settings {
            api_key: "sk-ant-123456789".into(),
            ..Settings::default()
        };
        assert_eq!(settings.masked().api_key, "****6789");
        assert_eq!(Settings::default().masked().api_key, "");
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut settings = Settings::default();
        SettingsPatch {
            create_summary_report: Some(false),
            structure_prompt: Some("fill it".into()),
            ..SettingsPatch::default()
        }
        .apply(&mut settings);
        assert!(!settings.create_summary_report);
        assert_eq!(settings.prompts.structure_prompt, "fill it");
        assert_eq!(settings.prompts.system_prompt, PromptSettings::default().system_prompt);
    }
}
