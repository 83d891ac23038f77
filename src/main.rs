use std::{
    io::Read as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use vaultscribe::{
    api,
    config::{self, Config},
    llm::AnthropicClient,
    logging::{self, LogMode},
    processing::{
        EditorOpener, Notifier, Pipeline, PlaceholderExpander, RunOutcome, StderrNotifier,
        TracingNotifier,
    },
    settings::SettingsStore,
    vault::{FsVault, NoteStore, VaultStructure},
};

#[derive(Parser)]
#[command(
    name = "vaultscribe",
    about = "File clipped text as classified, templated notes in a markdown vault"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process text from a file (or stdin) into a new note.
    Process {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Also write all generated queries as one block to this file.
        #[arg(long)]
        queries_file: Option<PathBuf>,
    },
    /// Process the content of an existing vault note into a new note.
    ProcessNote {
        /// Vault-relative path of the source note.
        path: String,
        /// Also write all generated queries as one block to this file.
        #[arg(long)]
        queries_file: Option<PathBuf>,
    },
    /// Show the content type assigned to text from a file (or stdin).
    Analyze {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Inspect or change persisted settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Verify the API key with a minimal model request.
    Check,
    /// Serve the HTTP surface.
    Serve,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print settings with the API key masked.
    Show,
    /// Assign a single setting.
    Set { key: String, value: String },
    /// Restore a prompt (`system_prompt`, `analyze_prompt`, `structure_prompt`) to its default.
    Reset { key: String },
    /// Write the full settings, API key included, as JSON to a file or stdout.
    Export {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Replace the settings with a previously exported JSON file.
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when a pipeline run completed with a failure record.
async fn run(cli: Cli) -> Result<bool> {
    let config = config::init_config().context("Invalid configuration")?;
    let mode = match cli.command {
        Command::Serve => LogMode::Server,
        _ => LogMode::Command,
    };
    logging::init_tracing(mode);

    match cli.command {
        Command::Process { file, queries_file } => {
            let text = read_input(file.as_deref())?;
            let pipeline = build_pipeline(config, Arc::new(StderrNotifier), true).await?;
            emit(pipeline.process_text(&text).await, queries_file.as_deref())
        }
        Command::ProcessNote { path, queries_file } => {
            let pipeline = build_pipeline(config, Arc::new(StderrNotifier), true).await?;
            emit(pipeline.process_note(&path).await, queries_file.as_deref())
        }
        Command::Analyze { file } => {
            let text = read_input(file.as_deref())?;
            let pipeline = build_pipeline(config, Arc::new(StderrNotifier), true).await?;
            let classification = pipeline.analyze(&text).await?;
            println!("{}", serde_json::to_string_pretty(&classification)?);
            Ok(true)
        }
        Command::Settings { action } => {
            let store = load_settings(config).await?;
            match action {
                SettingsAction::Show => {}
                SettingsAction::Set { key, value } => {
                    store
                        .update(|settings| settings.set_value(&key, &value))
                        .await
                        .with_context(|| format!("Failed to update setting '{key}'"))?;
                }
                SettingsAction::Reset { key } => {
                    store
                        .update(|settings| settings.reset_prompt(&key))
                        .await
                        .with_context(|| format!("Failed to reset '{key}'"))?;
                }
                SettingsAction::Export { file } => {
                    let document = store.snapshot().await.export()?;
                    match file {
                        Some(path) => {
                            std::fs::write(&path, document)
                                .with_context(|| format!("Failed to write {}", path.display()))?;
                            eprintln!("Settings exported to {}", path.display());
                        }
                        None => println!("{document}"),
                    }
                    return Ok(true);
                }
                SettingsAction::Import { file } => {
                    let document = std::fs::read_to_string(&file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    store
                        .update(|settings| settings.import(&document))
                        .await
                        .with_context(|| format!("Failed to import {}", file.display()))?;
                }
            }
            let current = store.snapshot().await.masked();
            println!("{}", serde_json::to_string_pretty(&current)?);
            Ok(true)
        }
        Command::Check => {
            let pipeline = build_pipeline(config, Arc::new(StderrNotifier), true).await?;
            pipeline
                .check_connection()
                .await
                .context("Connection check failed")?;
            println!("Connection OK ({})", config.model);
            Ok(true)
        }
        Command::Serve => {
            let pipeline = build_pipeline(config, Arc::new(TracingNotifier), false).await?;
            let app = api::create_router(Arc::new(pipeline));
            let (listener, port) = bind_listener(config)
                .await
                .context("Failed to bind listener")?;
            tracing::info!("Listening on http://0.0.0.0:{}", port);
            axum::serve(listener, app).await.context("Server error")?;
            Ok(true)
        }
    }
}

/// `wait_for_editor` is set for the CLI; the server must not block on the editor.
async fn build_pipeline(
    config: &Config,
    notifier: Arc<dyn Notifier>,
    wait_for_editor: bool,
) -> Result<Pipeline> {
    let client = AnthropicClient::new(config.api_url.clone(), config.model.clone())
        .context("Failed to build model client")?;
    let structure = VaultStructure::load(config.vault_structure_file.as_deref())
        .context("Failed to load vault structure")?;
    let notes = NoteStore::new(
        Arc::new(FsVault::new(config.vault_path.clone())),
        Arc::new(structure),
    );
    let settings = Arc::new(load_settings(config).await?);

    let mut pipeline = Pipeline::new(Arc::new(client), notes, settings)
        .with_notifier(notifier)
        .with_max_input_chars(config.max_input_chars)
        .with_opener(Arc::new(EditorOpener::new(
            config.open_command.clone(),
            wait_for_editor,
        )));
    if config.template_expansion {
        pipeline = pipeline.with_expander(Arc::new(PlaceholderExpander));
    }
    Ok(pipeline)
}

async fn load_settings(config: &Config) -> Result<SettingsStore> {
    SettingsStore::load(&config.settings_file, config.api_key.clone())
        .await
        .with_context(|| {
            format!(
                "Failed to load settings from {}",
                config.settings_file.display()
            )
        })
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            if text.trim().is_empty() {
                bail!("No input: pass --file or pipe text on stdin");
            }
            Ok(text)
        }
    }
}

/// Print the report (or the JSON result when reports are off) and report success.
fn emit(outcome: RunOutcome, queries_file: Option<&Path>) -> Result<bool> {
    match outcome.report.as_deref() {
        Some(report) => print!("{report}"),
        None => println!("{}", serde_json::to_string_pretty(&outcome.result)?),
    }
    if let (Some(path), Some(queries)) = (queries_file, outcome.queries.as_deref()) {
        std::fs::write(path, queries)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Queries written to {}", path.display());
    }
    Ok(outcome.result.is_success())
}

async fn bind_listener(config: &Config) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
