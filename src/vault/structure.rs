//! Category → template/folder layout of the vault.
//!
//! The bundled layout targets a numbered, German-language vault. A JSON override file can
//! replace individual category entries, add categories, or extend the folder list; values
//! it omits keep their bundled defaults.

use super::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const FALLBACK_CATEGORY: &str = "begriff";
const INTAKE_FOLDER: &str = "00_Inbox";
const TEMPLATE_DIR: &str = "99_Templates";

const BUNDLED_CATEGORIES: &[(&str, &str, &str)] = &[
    ("begriff", "99_Templates/Begriff.md", "02_Wissen/Begriffe"),
    ("methode", "99_Templates/Methode.md", "02_Wissen/Methoden"),
    ("buch", "99_Templates/Buch.md", "03_Quellen/Buecher"),
    ("projekt", "99_Templates/Projekt.md", "01_Projekte"),
    ("idee", "99_Templates/Idee.md", "04_Ideen"),
    ("webclip", "99_Templates/Webclip.md", "03_Quellen/Webclips"),
    ("zitat", "99_Templates/Zitat.md", "03_Quellen/Zitate"),
    ("studie", "99_Templates/Studie.md", "02_Wissen/Studien"),
];

const BUNDLED_FOLDERS: &[&str] = &[
    "00_Inbox",
    "01_Projekte",
    "02_Wissen",
    "02_Wissen/Begriffe",
    "02_Wissen/Methoden",
    "02_Wissen/Studien",
    "03_Quellen",
    "03_Quellen/Buecher",
    "03_Quellen/Webclips",
    "03_Quellen/Zitate",
    "04_Ideen",
    "99_Templates",
];

/// Template and default folder for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLayout {
    /// Vault-relative path of the category template.
    pub template: String,
    /// Vault-relative folder new notes of this category default to.
    pub folder: String,
}

/// Read-only description of the vault layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStructure {
    /// Known categories keyed by their lowercase name.
    pub categories: BTreeMap<String, CategoryLayout>,
    /// Every folder the model may choose from.
    pub folders: Vec<String>,
    /// Category whose template is used when a category has none.
    pub fallback_category: String,
    /// Folder that receives notes when the preferred location cannot be written.
    pub intake_folder: String,
    /// Folder holding templates; excluded from note listings.
    pub template_dir: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StructureOverrides {
    categories: BTreeMap<String, LayoutOverride>,
    folders: Vec<String>,
    fallback_category: Option<String>,
    intake_folder: Option<String>,
    template_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LayoutOverride {
    template: Option<String>,
    folder: Option<String>,
}

impl Default for VaultStructure {
    fn default() -> Self {
        let categories = BUNDLED_CATEGORIES
            .iter()
            .map(|(name, template, folder)| {
                (
                    (*name).to_string(),
                    CategoryLayout {
                        template: (*template).to_string(),
                        folder: (*folder).to_string(),
                    },
                )
            })
            .collect();

        Self {
            categories,
            folders: BUNDLED_FOLDERS.iter().map(|folder| folder.to_string()).collect(),
            fallback_category: FALLBACK_CATEGORY.into(),
            intake_folder: INTAKE_FOLDER.into(),
            template_dir: TEMPLATE_DIR.into(),
        }
    }
}

impl VaultStructure {
    /// Bundled defaults merged with the optional override file.
    pub fn load(overrides: Option<&Path>) -> Result<Self, StorageError> {
        let mut structure = Self::default();
        let Some(path) = overrides else {
            return Ok(structure);
        };

        let raw = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let parsed: StructureOverrides =
            serde_json::from_str(&raw).map_err(|source| StorageError::InvalidStructure {
                path: path.to_path_buf(),
                source,
            })?;
        structure.merge(parsed);
        tracing::debug!(
            path = %path.display(),
            categories = structure.categories.len(),
            folders = structure.folders.len(),
            "Applied vault structure overrides"
        );
        Ok(structure)
    }

    fn merge(&mut self, overrides: StructureOverrides) {
        for (name, layout) in overrides.categories {
            let key = name.trim().to_lowercase();
            let entry = self.categories.entry(key).or_insert_with(|| CategoryLayout {
                template: String::new(),
                folder: INTAKE_FOLDER.into(),
            });
            if let Some(template) = layout.template {
                entry.template = template;
            }
            if let Some(folder) = layout.folder {
                entry.folder = folder;
            }
        }
        if let Some(category) = overrides.fallback_category {
            self.fallback_category = category.trim().to_lowercase();
        }
        if let Some(folder) = overrides.intake_folder {
            self.intake_folder = folder;
        }
        if let Some(dir) = overrides.template_dir {
            self.template_dir = dir;
        }

        let implied: Vec<String> = self
            .categories
            .values()
            .map(|layout| layout.folder.clone())
            .chain(std::iter::once(self.intake_folder.clone()))
            .collect();
        for folder in overrides.folders.into_iter().chain(implied) {
            if !folder.trim().is_empty() && !self.folders.contains(&folder) {
                self.folders.push(folder);
            }
        }
    }

    /// Layout registered for `category`, if any.
    pub fn category(&self, category: &str) -> Option<&CategoryLayout> {
        self.categories.get(category)
    }

    /// Category names in display order.
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    /// Default folder for `category`, falling back to the intake folder.
    pub fn default_folder(&self, category: &str) -> &str {
        self.category(category)
            .map(|layout| layout.folder.as_str())
            .filter(|folder| !folder.trim().is_empty())
            .unwrap_or(self.intake_folder.as_str())
    }
}
