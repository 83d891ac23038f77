//! Title extraction and filename sanitizing.

use regex::Regex;
use std::sync::LazyLock;

/// Title used when a note carries neither a frontmatter title nor a heading.
pub const PLACEHOLDER_TITLE: &str = "Neue Notiz";

const SEPARATOR: char = '_';
const MAX_FILE_STEM_CHARS: usize = 100;

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A\s*---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)").unwrap());
static TITLE_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^title[ \t]*:[ \t]*(.*?)[ \t]*\r?$").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t#]*\r?$").unwrap());
static ILLEGAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\s\x00-\x1f]+"#).unwrap());
static SEPARATOR_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());

/// Split a leading `---` frontmatter block from the body.
pub(crate) fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    match FRONTMATTER_RE.captures(content) {
        Some(captures) => {
            let whole = captures.get(0).map_or(0, |m| m.end());
            (captures.get(1).map(|m| m.as_str()), &content[whole..])
        }
        None => (None, content),
    }
}

/// `title:` value of a frontmatter block, unquoted. Empty values count as absent.
pub(crate) fn frontmatter_title(content: &str) -> Option<String> {
    let (frontmatter, _) = split_frontmatter(content);
    let captures = TITLE_FIELD_RE.captures(frontmatter?)?;
    let title = unquote(captures.get(1)?.as_str());
    (!title.is_empty()).then_some(title)
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    let stripped = ['"', '\'']
        .iter()
        .find_map(|quote| {
            trimmed
                .strip_prefix(*quote)
                .and_then(|inner| inner.strip_suffix(*quote))
        })
        .unwrap_or(trimmed);
    stripped.trim().to_string()
}

/// Pick a title for generated note content.
///
/// Prefers the frontmatter `title:` field, then the first `# Heading` of the body, then
/// [`PLACEHOLDER_TITLE`].
pub fn extract_title(content: &str) -> String {
    frontmatter_title(content)
        .or_else(|| heading_title(content))
        .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string())
}

/// First `# Heading` of the body, ignoring the frontmatter block.
pub(crate) fn heading_title(content: &str) -> Option<String> {
    let (_, body) = split_frontmatter(content);
    HEADING_RE
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|heading| heading.as_str().trim().to_string())
        .filter(|heading| !heading.is_empty())
}

/// Turn a title into a filename stem that is safe on every common filesystem.
///
/// Path-illegal characters and whitespace collapse into a single `_`; leading and trailing
/// separators and dots are dropped.
pub fn sanitize_file_name(title: &str) -> String {
    let replaced = ILLEGAL_RE.replace_all(title, "_");
    let collapsed = SEPARATOR_RUN_RE.replace_all(&replaced, "_");
    let trimmed = trim_edges(&collapsed);
    let bounded: String = trimmed.chars().take(MAX_FILE_STEM_CHARS).collect();
    let stem = trim_edges(&bounded);
    if stem.is_empty() {
        sanitize_file_name(PLACEHOLDER_TITLE)
    } else {
        stem.to_string()
    }
}

fn trim_edges(value: &str) -> &str {
    value.trim_matches(|c| c == SEPARATOR || c == '.')
}
