//! Prompt assembly helpers.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").unwrap());

/// Cut `text` to at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Fill `{{name}}` placeholders in a single pass.
///
/// Substituted values are not re-scanned, so user text containing braces stays verbatim.
/// Unknown placeholders are left untouched.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |captures: &Captures<'_>| {
            let name = &captures[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

pub(crate) fn links_prompt(note: &str, known_titles: &[String]) -> String {
    format!(
        "Hier ist eine neue Notiz:\n\n{note}\n\nVorhandene Notizen im Vault:\n{titles}\n\n\
         Schlage Verknüpfungen ausschließlich zu vorhandenen Notizen vor. Antworte nur mit \
         JSON in der Form {{\"directLinks\": [], \"thematicLinks\": [], \
         \"hierarchicalLinks\": []}}. directLinks sind direkt verwandte Notizen, \
         thematicLinks teilen ein Thema, hierarchicalLinks sind Ober- oder Unterbegriffe.",
        titles = bullet_list(known_titles),
    )
}

pub(crate) fn queries_prompt(note: &str, category: &str) -> String {
    format!(
        "Erstelle Dataview-Abfragen für diese Notiz der Kategorie \"{category}\":\n\n{note}\n\n\
         Antworte nur mit JSON in der Form {{\"typeQuery\": \"\", \"tagQuery\": \"\", \
         \"customQuery\": \"\"}}. typeQuery listet Notizen derselben Kategorie, tagQuery \
         Notizen mit denselben Tags, customQuery ist eine weitere sinnvolle Abfrage. Gib \
         nur den Abfragetext ohne Codeblock an."
    )
}

pub(crate) fn path_prompt(note: &str, category: &str, folders: &[String]) -> String {
    format!(
        "In welchen Ordner gehört diese Notiz der Kategorie \"{category}\"?\n\n{note}\n\n\
         Verfügbare Ordner:\n{folders}\n\nAntworte ausschließlich mit dem Ordnerpfad.",
        folders = bullet_list(folders),
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (keine)".into();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
