use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_INPUT_CHARS: usize = 4000;
const SETTINGS_DIR: &str = ".vaultscribe";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Vaultscribe process.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory of the markdown vault notes are written into.
    pub vault_path: PathBuf,
    /// Base URL of the Anthropic Messages API.
    pub api_url: String,
    /// Model identifier sent with every completion request.
    pub model: String,
    /// API key taken from the environment, used to seed empty persisted settings.
    pub api_key: Option<String>,
    /// Location of the persisted user settings file.
    pub settings_file: PathBuf,
    /// Optional JSON file with vault structure overrides.
    pub vault_structure_file: Option<PathBuf>,
    /// Character budget applied to text before it is embedded in a prompt.
    pub max_input_chars: usize,
    /// Whether the bundled placeholder expander runs on freshly created notes.
    pub template_expansion: bool,
    /// Optional command used to open created notes (defaults to `$VISUAL`/`$EDITOR`).
    pub open_command: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vault_path = PathBuf::from(load_env("VAULT_PATH")?);
        let settings_file = load_env_optional("SETTINGS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| vault_path.join(SETTINGS_DIR).join("settings.json"));

        Ok(Self {
            api_url: load_env_optional("ANTHROPIC_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model: load_env_optional("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: load_env_optional("ANTHROPIC_API_KEY"),
            settings_file,
            vault_structure_file: load_env_optional("VAULT_STRUCTURE_FILE").map(PathBuf::from),
            max_input_chars: load_env_optional("MAX_INPUT_CHARS")
                .map(|value| {
                    value
                        .parse::<usize>()
                        .ok()
                        .filter(|chars| *chars > 0)
                        .ok_or_else(|| ConfigError::InvalidValue("MAX_INPUT_CHARS".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_MAX_INPUT_CHARS),
            template_expansion: load_env_optional("TEMPLATE_EXPANSION")
                .map(|value| {
                    parse_bool(&value)
                        .ok_or_else(|| ConfigError::InvalidValue("TEMPLATE_EXPANSION".into()))
                })
                .transpose()?
                .unwrap_or(false),
            open_command: load_env_optional("OPEN_COMMAND"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            vault_path,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        vault = %config.vault_path.display(),
        api_url = %config.api_url,
        model = %config.model,
        settings_file = %config.settings_file.display(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
