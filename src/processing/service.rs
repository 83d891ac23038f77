//! Pipeline service sequencing model calls and vault writes.

use crate::{
    llm::{Assistant, CompletionClient, LinkSuggestions, QueryArtifacts},
    metrics::{MetricsSnapshot, RunMetrics},
    processing::{
        expander::TemplateExpander,
        notify::{Notice, Notifier, TracingNotifier},
        opener::NoteOpener,
        types::{Classification, ProcessedNote, ProcessingError, ProcessingResult, RunOutcome},
    },
    report,
    settings::{Settings, SettingsError, SettingsPatch, SettingsStore},
    vault::{NoteHandle, NoteStore, extract_title},
};
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_MAX_INPUT_CHARS: usize = 4000;

/// Turns raw text into a filed note: classify, fill template, place, write, enrich.
///
/// The service owns long-lived handles to the completion client, vault adapter, settings
/// store and metrics so that the CLI and the HTTP surface share the same components.
/// Each run reads settings exactly once, at its start.
pub struct Pipeline {
    client: Arc<dyn CompletionClient>,
    notes: NoteStore,
    settings: Arc<SettingsStore>,
    expander: Option<Arc<dyn TemplateExpander>>,
    opener: Option<Arc<dyn NoteOpener>>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<RunMetrics>,
    max_input_chars: usize,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait NoteApi: Send + Sync {
    /// Run the full pipeline on `text`.
    async fn process_text(&self, text: &str) -> RunOutcome;

    /// Run the full pipeline on the content of an existing vault note.
    async fn process_note(&self, path: &str) -> RunOutcome;

    /// Classify `text` without creating anything.
    async fn analyze(&self, text: &str) -> Result<Classification, ProcessingError>;

    /// Send a minimal model request to verify the credential.
    async fn check_connection(&self) -> Result<(), ProcessingError>;

    /// Current settings.
    async fn settings(&self) -> Settings;

    /// Apply and persist a partial settings update.
    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, SettingsError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl Pipeline {
    /// Assemble a pipeline with no optional collaborators.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        notes: NoteStore,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            client,
            notes,
            settings,
            expander: None,
            opener: None,
            notifier: Arc::new(TracingNotifier),
            metrics: Arc::new(RunMetrics::new()),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    /// Post-process created notes with `expander`.
    pub fn with_expander(mut self, expander: Arc<dyn TemplateExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Open created notes with `opener` when the settings ask for it.
    pub fn with_opener(mut self, opener: Arc<dyn NoteOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Route status notifications to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Character budget for text embedded in prompts.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars.max(1);
        self
    }

    /// Process selected text into a new note.
    pub async fn process_text(&self, text: &str) -> RunOutcome {
        let settings = self.settings.snapshot().await;
        let outcome = self.execute(text, &settings).await;
        self.finish(outcome, &settings)
    }

    /// Process the content of the vault note at `path` into a new note.
    pub async fn process_note(&self, path: &str) -> RunOutcome {
        let settings = self.settings.snapshot().await;
        let outcome = match self.notes.vault().read(path).await {
            Ok(content) => self.execute(&content, &settings).await,
            Err(error) => Err(ProcessingError::from(error)),
        };
        self.finish(outcome, &settings)
    }

    /// Classify `text` and report where notes of that category go.
    pub async fn analyze(&self, text: &str) -> Result<Classification, ProcessingError> {
        let settings = self.settings.snapshot().await;
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyInput);
        }
        let assistant = Assistant::new(self.client.as_ref(), &settings, self.max_input_chars);
        self.notify(Notice::Progress("Analyzing content type".into()));
        let category = self.classify(&assistant, text).await.inspect_err(|error| {
            self.notify(Notice::Failed(error.to_string()));
        })?;
        let structure = self.notes.structure();
        let classification = Classification {
            known: structure.category(&category).is_some(),
            default_folder: structure.default_folder(&category).to_string(),
            category,
        };
        self.notify(Notice::Done(format!(
            "Content type: {}",
            classification.category
        )));
        Ok(classification)
    }

    /// Confirm the configured key is accepted by the model endpoint.
    pub async fn check_connection(&self) -> Result<(), ProcessingError> {
        let settings = self.settings.snapshot().await;
        let assistant = Assistant::new(self.client.as_ref(), &settings, self.max_input_chars);
        assistant.check_connection().await?;
        tracing::info!("Model connection verified");
        Ok(())
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn finish(
        &self,
        outcome: Result<ProcessedNote, ProcessingError>,
        settings: &Settings,
    ) -> RunOutcome {
        let result = match outcome {
            Ok(note) => {
                self.metrics.record_success();
                self.notify(Notice::Done(format!("Created {}", note.path)));
                ProcessingResult::Success(note)
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(%error, "Pipeline run aborted");
                self.notify(Notice::Failed(error.to_string()));
                ProcessingResult::failure(&error)
            }
        };
        let report = settings
            .create_summary_report
            .then(|| report::render(&result));
        let queries = result
            .note()
            .map(|note| note.queries.combined())
            .filter(|combined| !combined.is_empty());
        RunOutcome {
            result,
            report,
            queries,
        }
    }

    async fn execute(
        &self,
        text: &str,
        settings: &Settings,
    ) -> Result<ProcessedNote, ProcessingError> {
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyInput);
        }
        let assistant = Assistant::new(self.client.as_ref(), settings, self.max_input_chars);
        let structure = self.notes.structure();

        self.notify(Notice::Progress("Analyzing content type".into()));
        let category = self.classify(&assistant, text).await?;
        tracing::info!(category = %category, "Content classified");

        let template = self.notes.load_template(&category).await;
        self.notify(Notice::Progress(format!("Structuring note as {category}")));
        let content = assistant.structure(text, &category, &template).await?;
        let title = extract_title(&content);

        let suggested = assistant
            .suggest_path(&content, &category, &structure.folders)
            .await?;
        let folder = if suggested.is_empty() {
            structure.default_folder(&category).to_string()
        } else {
            suggested
        };

        self.notify(Notice::Progress(format!("Creating note in {folder}")));
        let file = self.notes.create_note(&content, &title, &folder).await?;
        let path = file.path().to_string();

        self.expand(&file).await;
        self.notify(Notice::Progress("Looking for related notes".into()));
        let link_suggestions = self.suggest_links(&assistant, &content, &folder).await;
        let queries = self.generate_queries(&assistant, &content, &category).await;
        if settings.open_note_after_creation {
            self.open(&file).await;
        }

        tracing::info!(
            category = %category,
            title = %title,
            path = %path,
            direct_links = link_suggestions.direct_links.len(),
            "Note processed"
        );

        Ok(ProcessedNote {
            content_type: category,
            title,
            file,
            path,
            link_suggestions,
            queries,
        })
    }

    async fn classify(
        &self,
        assistant: &Assistant<'_>,
        text: &str,
    ) -> Result<String, ProcessingError> {
        let structure = self.notes.structure();
        let reply = assistant.classify(text, &structure.category_names()).await?;
        let category = normalize_category(&reply);
        if category.is_empty() {
            tracing::warn!(reply = %reply, "Empty classification; using fallback category");
            return Ok(structure.fallback_category.clone());
        }
        Ok(category)
    }

    async fn expand(&self, file: &NoteHandle) {
        let Some(expander) = self.expander.as_ref() else {
            return;
        };
        if let Err(error) = expander.expand(self.notes.vault().as_ref(), file).await {
            self.degraded(format!("Template expansion skipped: {error}"));
        }
    }

    async fn suggest_links(
        &self,
        assistant: &Assistant<'_>,
        content: &str,
        folder: &str,
    ) -> LinkSuggestions {
        let titles = match self.notes.list_note_titles_near(folder).await {
            Ok(titles) => titles,
            Err(error) => {
                self.degraded(format!("Could not list existing notes: {error}"));
                return LinkSuggestions::default();
            }
        };
        match assistant.suggest_links(content, &titles).await {
            Ok(links) => links,
            Err(error) => {
                self.degraded(format!("Link suggestions unavailable: {error}"));
                LinkSuggestions::default()
            }
        }
    }

    async fn generate_queries(
        &self,
        assistant: &Assistant<'_>,
        content: &str,
        category: &str,
    ) -> QueryArtifacts {
        match assistant.generate_queries(content, category).await {
            Ok(queries) => queries,
            Err(error) => {
                self.degraded(format!("Query generation unavailable: {error}"));
                QueryArtifacts::default()
            }
        }
    }

    async fn open(&self, file: &NoteHandle) {
        let Some(opener) = self.opener.as_ref() else {
            return;
        };
        let Some(location) = self.notes.vault().locate(file) else {
            self.degraded(format!("Cannot open {}: no local path", file.path()));
            return;
        };
        if let Err(error) = opener.open(&location).await {
            self.degraded(format!("Could not open {}: {error}", file.path()));
        }
    }

    fn degraded(&self, message: String) {
        self.metrics.record_degraded_step();
        tracing::warn!(message = %message, "Optional step failed");
        self.notify(Notice::Warning(message));
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }
}

/// Lowercase, trim, and strip decoration such as quotes or trailing periods.
fn normalize_category(reply: &str) -> String {
    reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

#[async_trait]
impl NoteApi for Pipeline {
    async fn process_text(&self, text: &str) -> RunOutcome {
        Pipeline::process_text(self, text).await
    }

    async fn process_note(&self, path: &str) -> RunOutcome {
        Pipeline::process_note(self, path).await
    }

    async fn analyze(&self, text: &str) -> Result<Classification, ProcessingError> {
        Pipeline::analyze(self, text).await
    }

    async fn check_connection(&self) -> Result<(), ProcessingError> {
        Pipeline::check_connection(self).await
    }

    async fn settings(&self) -> Settings {
        self.settings.snapshot().await
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, SettingsError> {
        self.settings
            .update(|settings| {
                patch.apply(settings);
                Ok(())
            })
            .await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        Pipeline::metrics_snapshot(self)
    }
}
