//! HTTP surface for Vaultscribe.
//!
//! An editor front-end drives the pipeline through a compact Axum router:
//!
//! - `POST /process` – File the supplied text as a new note. Returns the processing result and,
//!   when enabled in the settings, the rendered markdown report.
//! - `POST /process-note` – Same, using the content of an existing vault note.
//! - `POST /analyze` – Classify text without creating anything.
//! - `GET /settings` / `PUT /settings` – Read (API key masked) or partially update settings.
//! - `GET /health` – Send a minimal model request to verify the configured API key.
//! - `GET /metrics` – Run counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by hosts.
//!
//! Pipeline failures are part of the result record, so `/process` answers `200` with
//! `"status": "failure"` rather than an error status.

use crate::processing::{Classification, NoteApi, ProcessingError, RunOutcome};
use crate::settings::{Settings, SettingsError, SettingsPatch};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the pipeline surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: NoteApi + 'static,
{
    Router::new()
        .route("/process", post(process_text::<S>))
        .route("/process-note", post(process_note::<S>))
        .route("/analyze", post(analyze::<S>))
        .route("/settings", get(get_settings::<S>).put(update_settings::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Request body for `POST /process` and `POST /analyze`.
#[derive(Deserialize)]
struct TextRequest {
    /// Selected text to process.
    text: String,
}

/// Request body for `POST /process-note`.
#[derive(Deserialize)]
struct NoteRequest {
    /// Vault-relative path of the note whose content is processed.
    path: String,
}

async fn process_text<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<TextRequest>,
) -> Json<RunOutcome>
where
    S: NoteApi,
{
    let outcome = service.process_text(&request.text).await;
    tracing::info!(success = outcome.result.is_success(), "Process request completed");
    Json(outcome)
}

async fn process_note<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<NoteRequest>,
) -> Json<RunOutcome>
where
    S: NoteApi,
{
    let outcome = service.process_note(&request.path).await;
    tracing::info!(
        source = %request.path,
        success = outcome.result.is_success(),
        "Process-note request completed"
    );
    Json(outcome)
}

async fn analyze<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<TextRequest>,
) -> Result<Json<Classification>, AppError>
where
    S: NoteApi,
{
    let classification = service.analyze(&request.text).await?;
    Ok(Json(classification))
}

async fn get_settings<S>(State(service): State<Arc<S>>) -> Json<Settings>
where
    S: NoteApi,
{
    Json(service.settings().await.masked())
}

async fn update_settings<S>(
    State(service): State<Arc<S>>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<Settings>, AppError>
where
    S: NoteApi,
{
    let updated = service.update_settings(patch).await?;
    Ok(Json(updated.masked()))
}

async fn health<S>(State(service): State<Arc<S>>) -> Result<Json<serde_json::Value>, AppError>
where
    S: NoteApi,
{
    service.check_connection().await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: NoteApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "process_selection",
                method: "POST",
                path: "/process",
                description: "Classify the text, fill the category template, and file it as a new note in the vault.",
                request_example: Some(json!({ "text": "Der Begriff Rekursion beschreibt ..." })),
            },
            CommandDescriptor {
                name: "process_note",
                method: "POST",
                path: "/process-note",
                description: "Process the content of an existing vault note into a new, structured note.",
                request_example: Some(json!({ "path": "00_Inbox/Clipping.md" })),
            },
            CommandDescriptor {
                name: "analyze",
                method: "POST",
                path: "/analyze",
                description: "Return the content type the model assigns to the text without creating a note.",
                request_example: Some(json!({ "text": "Selected text" })),
            },
            CommandDescriptor {
                name: "settings",
                method: "GET",
                path: "/settings",
                description: "Return the current settings with the API key masked.",
                request_example: None,
            },
            CommandDescriptor {
                name: "update_settings",
                method: "PUT",
                path: "/settings",
                description: "Update any subset of the settings; changes are persisted immediately.",
                request_example: Some(json!({
                    "api_key": "sk-ant-...",
                    "create_summary_report": true,
                    "open_note_after_creation": false
                })),
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Verify the API key with a minimal model request.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return run counters useful for diagnostics.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Processing(ProcessingError),
    Settings(SettingsError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Processing(error @ ProcessingError::EmptyInput) => {
                (StatusCode::BAD_REQUEST, error.to_string())
            }
            Self::Processing(ProcessingError::Llm(error)) if error.is_configuration() => {
                (StatusCode::PRECONDITION_FAILED, error.to_string())
            }
            Self::Processing(error) => (StatusCode::BAD_GATEWAY, error.to_string()),
            Self::Settings(
                error @ (SettingsError::UnknownKey(_)
                | SettingsError::InvalidValue { .. }
                | SettingsError::Document(_)),
            ) => (StatusCode::BAD_REQUEST, error.to_string()),
            Self::Settings(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

impl From<SettingsError> for AppError {
    fn from(inner: SettingsError) -> Self {
        Self::Settings(inner)
    }
}
