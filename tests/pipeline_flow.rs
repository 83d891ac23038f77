//! End-to-end pipeline runs against a mocked Messages API and a temporary vault.

use std::{
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use httpmock::{Method::POST, Mock, MockServer};
use serde_json::json;
use tempfile::TempDir;
use vaultscribe::{
    llm::{AnthropicClient, LlmError},
    processing::{
        ExpansionError, Notice, Notifier, NoteOpener, Pipeline, PlaceholderExpander,
        ProcessingError, ProcessingResult, TemplateExpander,
    },
    settings::{Settings, SettingsStore},
    vault::{FsVault, NoteHandle, NoteStore, Vault, VaultStructure},
};

const STRUCTURED_NOTE: &str = "---\ntitle: \"Rekursion\"\nkategorie: \"begriff\"\n---\n\n# Rekursion\n\nEine Funktion, die sich selbst aufruft.\n";

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    fn warnings(&self) -> usize {
        self.notices
            .lock()
            .expect("lock")
            .iter()
            .filter(|notice| matches!(notice, Notice::Warning(_)))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("lock").push(notice);
    }
}

struct FailingExpander;

#[async_trait]
impl TemplateExpander for FailingExpander {
    async fn expand(&self, _vault: &dyn Vault, _note: &NoteHandle) -> Result<(), ExpansionError> {
        Err(ExpansionError::Failed("templater unavailable".into()))
    }
}

#[derive(Default)]
struct RecordingOpener {
    fail: bool,
    opened: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl NoteOpener for RecordingOpener {
    async fn open(&self, path: &Path) -> io::Result<()> {
        self.opened.lock().expect("lock").push(path.to_path_buf());
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no editor"));
        }
        Ok(())
    }
}

fn pipeline(server: &MockServer, vault: &TempDir, api_key: &str) -> Pipeline {
    pipeline_with(
        server,
        vault,
        Settings {
            api_key: api_key.into(),
            ..Settings::default()
        },
    )
}

fn pipeline_with(server: &MockServer, vault: &TempDir, settings: Settings) -> Pipeline {
    let client = AnthropicClient::new(server.base_url(), "claude-test").expect("client");
    let notes = NoteStore::new(
        Arc::new(FsVault::new(vault.path())),
        Arc::new(VaultStructure::default()),
    );
    Pipeline::new(
        Arc::new(client),
        notes,
        Arc::new(SettingsStore::in_memory(settings)),
    )
}

/// Mocks for link and query replies that carry nothing.
async fn empty_enrichment(server: &MockServer) -> Vec<Mock<'_>> {
    vec![
        reply(server, "Vorhandene Notizen im Vault", "{}").await,
        reply(server, "Erstelle Dataview-Abfragen", "{}").await,
    ]
}

async fn reply<'a>(server: &'a MockServer, prompt_fragment: &str, text: &str) -> Mock<'a> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "sk-test")
                .body_contains(prompt_fragment);
            then.status(200)
                .json_body(json!({ "content": [{ "type": "text", "text": text }] }));
        })
        .await
}

/// Mocks for classification, structuring and placement of the "Rekursion" note.
async fn core_replies(server: &MockServer) -> Vec<Mock<'_>> {
    vec![
        reply(server, "Ordne den folgenden Inhalt", "Begriff").await,
        reply(server, "die folgende Vorlage", STRUCTURED_NOTE).await,
        reply(server, "In welchen Ordner", "02_Wissen/Begriffe").await,
    ]
}

#[tokio::test]
async fn selection_becomes_note_in_suggested_folder() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(vault.path().join("02_Wissen")).expect("mkdir");
    std::fs::write(vault.path().join("02_Wissen/Iteration.md"), "# Iteration\n").expect("seed");

    let core = core_replies(&server).await;
    let links = reply(
        &server,
        "Vorhandene Notizen im Vault",
        r#"Gern: {"directLinks": ["[[Iteration]]", "Iteration"], "thematicLinks": []}"#,
    )
    .await;
    let queries = reply(
        &server,
        "Erstelle Dataview-Abfragen",
        r#"{"typeQuery": "```dataview\nLIST FROM \"02_Wissen/Begriffe\"\n```", "tagQuery": "", "customQuery": ""}"#,
    )
    .await;

    let outcome = pipeline(&server, &vault, "sk-test")
        .process_text("Rekursion bezeichnet eine Funktion, die sich selbst aufruft.")
        .await;

    let note = outcome.result.note().expect("success");
    assert_eq!(note.content_type, "begriff");
    assert_eq!(note.title, "Rekursion");
    assert_eq!(note.path, "02_Wissen/Begriffe/Rekursion.md");
    assert_eq!(note.link_suggestions.direct_links, vec!["Iteration".to_string()]);
    assert_eq!(note.queries.type_query, "LIST FROM \"02_Wissen/Begriffe\"");

    let written = std::fs::read_to_string(vault.path().join("02_Wissen/Begriffe/Rekursion.md"))
        .expect("note written");
    assert_eq!(written, STRUCTURED_NOTE);

    let report = outcome.report.expect("report enabled by default");
    assert!(report.contains("Rekursion"));
    assert!(report.contains("- [[Iteration]]"));
    assert_eq!(
        outcome.queries.as_deref(),
        Some("/* Type query */\nLIST FROM \"02_Wissen/Begriffe\"\n")
    );

    for mock in core.iter().chain([&links, &queries]) {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn missing_api_key_fails_without_requests_or_files() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let any = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).json_body(json!({ "content": [] }));
        })
        .await;

    let outcome = pipeline(&server, &vault, "").process_text("Rekursion").await;

    assert_eq!(
        outcome.result,
        ProcessingResult::Failure {
            error_message: LlmError::MissingApiKey.to_string()
        }
    );
    assert!(outcome.report.expect("report").contains("No API key configured"));
    assert_eq!(any.hits_async().await, 0);
    let entries = std::fs::read_dir(vault.path()).expect("read vault").count();
    assert_eq!(entries, 0);
}

#[tokio::test]
async fn malformed_link_reply_still_succeeds_with_warning() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let _core = core_replies(&server).await;
    let _links = reply(&server, "Vorhandene Notizen im Vault", "Keine Ahnung.").await;
    server
        .mock_async(|when, then| {
            when.method(POST).body_contains("Erstelle Dataview-Abfragen");
            then.status(529).body("overloaded");
        })
        .await;

    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = pipeline(&server, &vault, "sk-test").with_notifier(notifier.clone());
    let outcome = pipeline.process_text("Rekursion").await;

    let note = outcome.result.note().expect("success despite degraded steps");
    assert!(note.link_suggestions.is_empty());
    assert!(note.queries.labelled().is_empty());
    assert_eq!(outcome.queries, None);
    assert!(vault.path().join("02_Wissen/Begriffe/Rekursion.md").exists());

    assert_eq!(notifier.warnings(), 1);
    let metrics = pipeline.metrics_snapshot();
    assert_eq!(metrics.runs_succeeded, 1);
    assert_eq!(metrics.degraded_steps, 1);
}

#[tokio::test]
async fn repeated_runs_never_overwrite_and_expand_placeholders() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let _classify = reply(&server, "Ordne den folgenden Inhalt", "Begriff").await;
    let _structure = reply(
        &server,
        "die folgende Vorlage",
        "---\ntitle: \"Rekursion\"\n---\n\n# {{title}}\n\nErstellt am {{date}}.\n",
    )
    .await;
    let _path = reply(&server, "In welchen Ordner", "02_Wissen/Begriffe").await;
    let _links = reply(&server, "Vorhandene Notizen im Vault", "{}").await;
    let _queries = reply(&server, "Erstelle Dataview-Abfragen", "{}").await;

    let pipeline = pipeline(&server, &vault, "sk-test").with_expander(Arc::new(PlaceholderExpander));
    let first = pipeline.process_text("Rekursion").await;
    let second = pipeline.process_text("Rekursion").await;

    assert_eq!(
        first.result.note().expect("first").path,
        "02_Wissen/Begriffe/Rekursion.md"
    );
    assert_eq!(
        second.result.note().expect("second").path,
        "02_Wissen/Begriffe/Rekursion_1.md"
    );

    let expanded = std::fs::read_to_string(vault.path().join("02_Wissen/Begriffe/Rekursion_1.md"))
        .expect("second note");
    assert!(expanded.contains("# Rekursion\n"), "{expanded}");
    assert!(!expanded.contains("Rekursion 1"));
    assert!(!expanded.contains("{{date}}"));
}

#[tokio::test]
async fn expansion_keeps_underscores_of_the_note_title() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let _classify = reply(&server, "Ordne den folgenden Inhalt", "Begriff").await;
    let _structure = reply(
        &server,
        "die folgende Vorlage",
        "---\ntitle: \"snake_case Namen\"\n---\n\n# {{title}}",
    )
    .await;
    let _path = reply(&server, "In welchen Ordner", "02_Wissen/Begriffe").await;
    let _enrichment = empty_enrichment(&server).await;

    let outcome = pipeline(&server, &vault, "sk-test")
        .with_expander(Arc::new(PlaceholderExpander))
        .process_text("snake_case")
        .await;

    let note = outcome.result.note().expect("success");
    assert_eq!(note.title, "snake_case Namen");
    let written = std::fs::read_to_string(vault.path().join(&note.path)).expect("note");
    assert!(written.ends_with("# snake_case Namen"), "{written}");
}

#[tokio::test]
async fn full_note_path_answer_is_treated_as_its_folder() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let _classify = reply(&server, "Ordne den folgenden Inhalt", "Begriff").await;
    let _structure = reply(&server, "die folgende Vorlage", STRUCTURED_NOTE).await;
    let _path = reply(&server, "In welchen Ordner", "`02_Wissen/Begriffe/Rekursion.md`").await;
    let _enrichment = empty_enrichment(&server).await;

    let outcome = pipeline(&server, &vault, "sk-test").process_text("Rekursion").await;

    let note = outcome.result.note().expect("success");
    assert_eq!(note.path, "02_Wissen/Begriffe/Rekursion.md");
    let created = vault.path().join("02_Wissen/Begriffe/Rekursion.md");
    assert!(created.is_file());
}

#[tokio::test]
async fn failing_expander_degrades_without_losing_the_note() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let _core = core_replies(&server).await;
    let _enrichment = empty_enrichment(&server).await;

    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = pipeline(&server, &vault, "sk-test")
        .with_expander(Arc::new(FailingExpander))
        .with_notifier(notifier.clone());
    let outcome = pipeline.process_text("Rekursion").await;

    assert!(outcome.result.is_success());
    let written = std::fs::read_to_string(vault.path().join("02_Wissen/Begriffe/Rekursion.md"))
        .expect("note kept");
    assert_eq!(written, STRUCTURED_NOTE);
    assert_eq!(notifier.warnings(), 1);
    assert_eq!(pipeline.metrics_snapshot().degraded_steps, 1);
}

#[tokio::test]
async fn created_note_is_opened_when_enabled() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let _core = core_replies(&server).await;
    let _enrichment = empty_enrichment(&server).await;

    let opener = Arc::new(RecordingOpener::default());
    let settings = Settings {
        api_key: "sk-test".into(),
        open_note_after_creation: true,
        ..Settings::default()
    };
    let pipeline = pipeline_with(&server, &vault, settings).with_opener(opener.clone());
    let outcome = pipeline.process_text("Rekursion").await;

    assert!(outcome.result.is_success());
    let opened = opener.opened.lock().expect("lock").clone();
    assert_eq!(
        opened,
        vec![vault.path().join("02_Wissen").join("Begriffe").join("Rekursion.md")]
    );
    assert_eq!(pipeline.metrics_snapshot().degraded_steps, 0);
}

#[tokio::test]
async fn opener_is_skipped_when_disabled_and_failure_only_warns() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let _core = core_replies(&server).await;
    let _enrichment = empty_enrichment(&server).await;

    let idle = Arc::new(RecordingOpener::default());
    pipeline(&server, &vault, "sk-test")
        .with_opener(idle.clone())
        .process_text("Rekursion")
        .await;
    assert!(idle.opened.lock().expect("lock").is_empty());

    let failing = Arc::new(RecordingOpener {
        fail: true,
        ..RecordingOpener::default()
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = Settings {
        api_key: "sk-test".into(),
        open_note_after_creation: true,
        ..Settings::default()
    };
    let pipeline = pipeline_with(&server, &vault, settings)
        .with_opener(failing.clone())
        .with_notifier(notifier.clone());
    let outcome = pipeline.process_text("Rekursion").await;

    let note = outcome.result.note().expect("success despite opener failure");
    assert_eq!(note.path, "02_Wissen/Begriffe/Rekursion_1.md");
    assert!(vault.path().join(&note.path).exists());
    assert_eq!(failing.opened.lock().expect("lock").len(), 1);
    assert_eq!(notifier.warnings(), 1);
    assert_eq!(pipeline.metrics_snapshot().degraded_steps, 1);
}

#[tokio::test]
async fn connection_check_uses_the_stored_key() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    let ok = reply(&server, "Sage nur", "OK").await;

    pipeline(&server, &vault, "sk-test")
        .check_connection()
        .await
        .expect("connection ok");
    ok.assert_async().await;

    let error = pipeline(&server, &vault, "")
        .check_connection()
        .await
        .expect_err("missing key");
    assert!(matches!(error, ProcessingError::Llm(LlmError::MissingApiKey)));
    assert_eq!(ok.hits_async().await, 1);
}

#[tokio::test]
async fn existing_note_is_processed_from_the_vault() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(vault.path().join("00_Inbox")).expect("mkdir");
    std::fs::write(
        vault.path().join("00_Inbox/Clip.md"),
        "Rekursion: eine Funktion ruft sich selbst auf.",
    )
    .expect("seed");

    let classify = server
        .mock_async(|when, then| {
            when.method(POST)
                .body_contains("Ordne den folgenden Inhalt")
                .body_contains("eine Funktion ruft sich selbst auf");
            then.status(200)
                .json_body(json!({ "content": [{ "type": "text", "text": "Begriff" }] }));
        })
        .await;
    let _structure = reply(&server, "die folgende Vorlage", STRUCTURED_NOTE).await;
    let _path = reply(&server, "In welchen Ordner", "").await;
    let _links = reply(&server, "Vorhandene Notizen im Vault", "{}").await;
    let _queries = reply(&server, "Erstelle Dataview-Abfragen", "{}").await;

    let outcome = pipeline(&server, &vault, "sk-test")
        .process_note("00_Inbox/Clip.md")
        .await;

    classify.assert_async().await;
    let note = outcome.result.note().expect("success");
    // An empty folder answer falls back to the category's default folder.
    assert_eq!(note.path, "02_Wissen/Begriffe/Rekursion.md");
}

#[tokio::test]
async fn missing_source_note_is_a_failure() {
    let server = MockServer::start_async().await;
    let vault = tempfile::tempdir().expect("tempdir");

    let outcome = pipeline(&server, &vault, "sk-test")
        .process_note("00_Inbox/Fehlt.md")
        .await;

    assert!(!outcome.result.is_success());
}
