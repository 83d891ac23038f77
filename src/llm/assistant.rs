//! Note-specific model operations.

use super::client::{CompletionClient, CompletionRequest};
use super::prompts::{self, fill, truncate_chars};
use super::types::{LinkSuggestions, QueryArtifacts};
use super::LlmError;
use crate::settings::Settings;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// Cap on existing note titles listed in the link prompt.
const MAX_KNOWN_TITLES: usize = 500;

/// Issues the pipeline's model requests using one settings snapshot.
pub struct Assistant<'a> {
    client: &'a dyn CompletionClient,
    settings: &'a Settings,
    max_input_chars: usize,
}

impl<'a> Assistant<'a> {
    /// Bind a transport to the settings of the current run.
    pub fn new(
        client: &'a dyn CompletionClient,
        settings: &'a Settings,
        max_input_chars: usize,
    ) -> Self {
        Self {
            client,
            settings,
            max_input_chars,
        }
    }

    async fn ask(
        &self,
        operation: &'static str,
        prompt: String,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        if !self.settings.has_api_key() {
            return Err(LlmError::MissingApiKey);
        }
        let request = CompletionRequest {
            system: self.settings.prompts.system_prompt.clone(),
            prompt,
            temperature,
            max_tokens,
        };
        let reply = self.client.complete(&self.settings.api_key, request).await?;
        tracing::debug!(operation, reply_chars = reply.chars().count(), "Model replied");
        Ok(reply)
    }

    fn clip<'t>(&self, text: &'t str) -> &'t str {
        truncate_chars(text, self.max_input_chars)
    }

    /// Send a minimal request to confirm the stored key and endpoint work.
    pub async fn check_connection(&self) -> Result<(), LlmError> {
        self.ask(
            "check_connection",
            "Sage nur \"OK\" ohne weitere Erklärung.".to_string(),
            0.0,
            10,
        )
        .await?;
        Ok(())
    }

    /// Ask which of `categories` the text belongs to. Returns the raw, trimmed reply.
    pub async fn classify(&self, text: &str, categories: &[&str]) -> Result<String, LlmError> {
        let categories = categories.join(", ");
        let prompt = fill(
            &self.settings.prompts.analyze_prompt,
            &[("categories", categories.as_str()), ("text", self.clip(text))],
        );
        let reply = self.ask("classify", prompt, 0.0, 50).await?;
        Ok(reply.trim().to_string())
    }

    /// Fill `template` with `text` for the given category and return the note markdown.
    pub async fn structure(
        &self,
        text: &str,
        category: &str,
        template: &str,
    ) -> Result<String, LlmError> {
        let prompt = fill(
            &self.settings.prompts.structure_prompt,
            &[
                ("category", category),
                ("template", template),
                ("text", self.clip(text)),
            ],
        );
        let reply = self.ask("structure", prompt, 0.3, 4000).await?;
        let note = strip_code_fence(&reply);
        if note.is_empty() {
            return Err(LlmError::InvalidResponse(
                "model returned an empty note".into(),
            ));
        }
        Ok(note.to_string())
    }

    /// Propose links from `note` to existing notes.
    ///
    /// Only the first 500 entries of `known_titles` are offered, so callers
    /// order them by relevance. Transport failures propagate; an unparseable answer yields
    /// empty suggestions.
    pub async fn suggest_links(
        &self,
        note: &str,
        known_titles: &[String],
    ) -> Result<LinkSuggestions, LlmError> {
        let titles = &known_titles[..known_titles.len().min(MAX_KNOWN_TITLES)];
        let prompt = prompts::links_prompt(self.clip(note), titles);
        let reply = self.ask("suggest_links", prompt, 0.2, 1000).await?;
        let parsed: LinkSuggestions = parse_json_reply(&reply, "link suggestions");
        Ok(LinkSuggestions {
            direct_links: clean_links(parsed.direct_links),
            thematic_links: clean_links(parsed.thematic_links),
            hierarchical_links: clean_links(parsed.hierarchical_links),
        })
    }

    /// Generate indexing-add-on queries for `note`.
    ///
    /// Transport failures propagate; an unparseable answer yields empty queries.
    pub async fn generate_queries(
        &self,
        note: &str,
        category: &str,
    ) -> Result<QueryArtifacts, LlmError> {
        let prompt = prompts::queries_prompt(self.clip(note), category);
        let reply = self.ask("generate_queries", prompt, 0.2, 1000).await?;
        let parsed: QueryArtifacts = parse_json_reply(&reply, "queries");
        Ok(QueryArtifacts {
            type_query: strip_code_fence(&parsed.type_query).to_string(),
            tag_query: strip_code_fence(&parsed.tag_query).to_string(),
            custom_query: strip_code_fence(&parsed.custom_query).to_string(),
        })
    }

    /// Ask for the folder `note` belongs in. May return an empty string.
    pub async fn suggest_path(
        &self,
        note: &str,
        category: &str,
        folders: &[String],
    ) -> Result<String, LlmError> {
        let prompt = prompts::path_prompt(self.clip(note), category, folders);
        let reply = self.ask("suggest_path", prompt, 0.0, 100).await?;
        Ok(clean_path(&reply))
    }
}

/// Decode the first JSON object in `reply`, or `T::default()` when there is none.
fn parse_json_reply<T>(reply: &str, what: &'static str) -> T
where
    T: DeserializeOwned + Default,
{
    let candidate = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            tracing::warn!(what, "Model reply contained no JSON object; using empty default");
            return T::default();
        }
    };
    match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(what, %error, "Model reply was not valid JSON; using empty default");
            T::default()
        }
    }
}

fn clean_links(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .map(|link| {
            let trimmed = link.trim();
            let inner = trimmed
                .strip_prefix("[[")
                .and_then(|rest| rest.strip_suffix("]]"))
                .unwrap_or(trimmed);
            inner.trim().to_string()
        })
        .filter(|link| !link.is_empty() && seen.insert(link.clone()))
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (`markdown`, `dataview`, ...) on the opening line.
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

/// First line of the reply as a folder. A trailing note file name is dropped.
fn clean_path(reply: &str) -> String {
    let decoration = |c: char| matches!(c, '"' | '\'' | '`' | '/' | '\\') || c.is_whitespace();
    let line = reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches(decoration);
    let folder = match line.rsplit_once(['/', '\\']) {
        Some((parent, name)) if is_note_file(name) => parent,
        None if is_note_file(line) => "",
        _ => line,
    };
    folder.trim_matches(decoration).to_string()
}

fn is_note_file(name: &str) -> bool {
    name.to_lowercase().ends_with(".md")
}
