//! Markdown summary of a pipeline run.

use crate::processing::{ProcessedNote, ProcessingResult};
use std::fmt::Write as _;

/// Render `result` as a markdown report. Pure and deterministic.
pub fn render(result: &ProcessingResult) -> String {
    match result {
        ProcessingResult::Success(note) => render_success(note),
        ProcessingResult::Failure { error_message } => {
            format!("# Processing failed\n\n{error_message}\n")
        }
    }
}

fn render_success(note: &ProcessedNote) -> String {
    let mut out = String::new();
    out.push_str("# Processing report\n\n## Details\n\n");
    let _ = writeln!(out, "- **Title:** {}", note.title);
    let _ = writeln!(out, "- **Category:** {}", note.content_type);
    let _ = writeln!(out, "- **Path:** `{}`", note.path);

    let links = &note.link_suggestions;
    push_links(&mut out, "Direct links", &links.direct_links);
    push_links(&mut out, "Thematic links", &links.thematic_links);
    if !links.hierarchical_links.is_empty() {
        push_links(&mut out, "Hierarchical links", &links.hierarchical_links);
    }

    let queries = note.queries.labelled();
    if !queries.is_empty() {
        out.push_str("\n## Queries\n");
        for (label, query) in queries {
            let _ = write!(out, "\n### {label}\n\n```dataview\n{}\n```\n", query.trim());
        }
    }

    out
}

fn push_links(out: &mut String, heading: &str, links: &[String]) {
    let _ = write!(out, "\n## {heading}\n\n");
    if links.is_empty() {
        out.push_str("_No suggestions._\n");
        return;
    }
    for link in links {
        let _ = writeln!(out, "- [[{link}]]");
    }
}
