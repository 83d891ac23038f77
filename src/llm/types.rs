use serde::{Deserialize, Serialize};

/// Related notes proposed by the model, grouped by relation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkSuggestions {
    /// Notes the new note should link to directly.
    pub direct_links: Vec<String>,
    /// Notes sharing a theme with the new note.
    pub thematic_links: Vec<String>,
    /// Parent or child notes in a topic hierarchy.
    pub hierarchical_links: Vec<String>,
}

impl LinkSuggestions {
    /// True when no suggestion of any kind is present.
    pub fn is_empty(&self) -> bool {
        self.direct_links.is_empty()
            && self.thematic_links.is_empty()
            && self.hierarchical_links.is_empty()
    }
}

/// Query snippets for the note-indexing add-on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryArtifacts {
    /// Lists notes of the same category.
    pub type_query: String,
    /// Lists notes sharing the new note's tags.
    pub tag_query: String,
    /// Free-form query chosen by the model.
    pub custom_query: String,
}

impl QueryArtifacts {
    /// Non-empty queries paired with a display label.
    pub fn labelled(&self) -> Vec<(&'static str, &str)> {
        [
            ("Type query", self.type_query.as_str()),
            ("Tag query", self.tag_query.as_str()),
            ("Custom query", self.custom_query.as_str()),
        ]
        .into_iter()
        .filter(|(_, query)| !query.trim().is_empty())
        .collect()
    }

    /// Every non-empty query in one plain-text block, each preceded by a `/* label */`
    /// comment, ready to paste into a note. Empty when there are no queries.
    pub fn combined(&self) -> String {
        self.labelled()
            .into_iter()
            .map(|(label, query)| format!("/* {label} */\n{}\n", query.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
