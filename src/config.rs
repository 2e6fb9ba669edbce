use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_CHUNK_MAX_CHARS: usize = 12_000;
const DEFAULT_SERVER_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the summarization pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend used for map and reduce model calls.
    pub model_provider: ModelProvider,
    /// Credential for the OpenAI adapter. Absence surfaces when summarizing, not at load.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Model identifier passed to the provider and recorded on each summary.
    pub summary_model: String,
    /// Advisory per-chunk size limit in characters.
    pub chunk_max_chars: usize,
    /// Number of map-phase requests allowed in flight for one file.
    pub map_concurrency: usize,
    /// Optional per-request timeout applied by the HTTP model adapters.
    pub model_timeout_secs: Option<u64>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Address the HTTP server binds to. Loopback unless `SERVER_HOST` says otherwise.
    pub server_host: IpAddr,
    /// Directory that registered files must live under. Unset means any readable path.
    pub storage_root: Option<PathBuf>,
}

/// Supported model backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelProvider {
    /// Hosted OpenAI Responses API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(load_env_optional)
    }

    /// Load configuration through `lookup`, which returns the value of a variable when set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            model_provider: match lookup("MODEL_PROVIDER") {
                Some(value) => value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("MODEL_PROVIDER".to_string()))?,
                None => ModelProvider::OpenAI,
            },
            openai_api_key: lookup("OPENAI_API_KEY"),
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ollama_url: lookup("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            summary_model: lookup("SUMMARY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            chunk_max_chars: parse_positive(&lookup, "CHUNK_MAX_CHARS")?
                .unwrap_or(DEFAULT_CHUNK_MAX_CHARS),
            map_concurrency: parse_positive(&lookup, "MAP_CONCURRENCY")?.unwrap_or(1),
            model_timeout_secs: parse_value(&lookup, "MODEL_TIMEOUT_SECS")?,
            server_port: parse_value(&lookup, "SERVER_PORT")?,
            server_host: parse_value(&lookup, "SERVER_HOST")?.unwrap_or(DEFAULT_SERVER_HOST),
            storage_root: lookup("STORAGE_ROOT").map(PathBuf::from),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_provider: ModelProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            summary_model: DEFAULT_MODEL.to_string(),
            chunk_max_chars: DEFAULT_CHUNK_MAX_CHARS,
            map_concurrency: 1,
            model_timeout_secs: None,
            server_port: None,
            server_host: DEFAULT_SERVER_HOST,
            storage_root: None,
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<usize>, ConfigError> {
    match parse_value::<usize>(lookup, key)? {
        Some(0) => Err(ConfigError::InvalidValue(key.to_string())),
        other => Ok(other),
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated by the binary entrypoint.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
///
/// Call after `logging::init_tracing` so the summary event below is recorded, and after
/// loading `.env` so its values are visible.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    let config = Config::from_env()?;
    log_loaded(&config);
    Ok(CONFIG.get_or_init(|| config))
}

fn log_loaded(config: &Config) {
    tracing::debug!(
        provider = ?config.model_provider,
        model = %config.summary_model,
        chunk_max_chars = config.chunk_max_chars,
        map_concurrency = config.map_concurrency,
        server_host = %config.server_host,
        server_port = ?config.server_port,
        storage_root = ?config.storage_root,
        "Loaded configuration"
    );
}
