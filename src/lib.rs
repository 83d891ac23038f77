#![deny(missing_docs)]

//! Core library for Vaultscribe: file clipped text as templated notes in a markdown vault.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Language-model client and note-specific prompts.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline run counters.
pub mod metrics;
/// Note processing pipeline.
pub mod processing;
/// Markdown summary reports.
pub mod report;
/// Persisted user settings.
pub mod settings;
/// Vault layout, storage and note creation.
pub mod vault;
