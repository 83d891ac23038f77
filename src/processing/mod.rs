//! Note pipeline: classification, template fill, placement, creation and enrichment.

pub mod expander;
pub mod notify;
pub mod opener;
mod service;
pub mod types;

pub use expander::{ExpansionError, PlaceholderExpander, TemplateExpander};
pub use notify::{Notice, Notifier, StderrNotifier, TracingNotifier};
pub use opener::{EditorOpener, NoteOpener};
pub use service::{NoteApi, Pipeline};
pub use types::{
    Classification, ProcessedNote, ProcessingError, ProcessingResult, RunOutcome,
};
