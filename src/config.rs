//! TOML configuration with environment overrides.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration pointed at `data/employee_handbook.pdf`. Secrets
//! never come from the file: the model API key is read from the
//! environment only.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `model.endpoint`.
pub const ENDPOINT_ENV: &str = "AZURE_INFERENCE_SDK_ENDPOINT";
/// Environment variable holding the model API key.
pub const API_KEY_ENV: &str = "AZURE_INFERENCE_SDK_KEY";
/// Environment variable overriding the port of `server.bind`.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    #[serde(default = "default_document_path")]
    pub path: PathBuf,
    /// Upper bound on a single load attempt when serving a request.
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: default_document_path(),
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

fn default_document_path() -> PathBuf {
    PathBuf::from("data/employee_handbook.pdf")
}
fn default_load_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum number of excerpts handed to the model.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Base URL of the chat-completions service.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Appended as `?api-version=` when set.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Populated from the environment, never from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            name: default_model_name(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            api_version: None,
            api_key: None,
        }
    }
}

fn default_model_name() -> String {
    "gpt-4.1".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    1.0
}
fn default_top_p() -> f32 {
    1.0
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

/// Load `.env` into the process environment (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse configuration from a TOML string and validate it.
///
/// Environment overrides are not applied; see [`Config::apply_env`].
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, or defaults when `path` is `None`,
/// then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };
    config.apply_env()?;
    Ok(config)
}

impl Config {
    /// Apply `AZURE_INFERENCE_SDK_ENDPOINT`, `AZURE_INFERENCE_SDK_KEY` and `PORT`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(endpoint) = env_opt(ENDPOINT_ENV) {
            self.model.endpoint = Some(endpoint);
        }
        self.model.api_key = env_opt(API_KEY_ENV);
        if let Some(port) = env_opt(PORT_ENV) {
            self.server.bind = with_port(&self.server.bind, &port)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }

        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }

        if self.model.max_tokens == 0 {
            anyhow::bail!("model.max_tokens must be > 0");
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            anyhow::bail!("model.temperature must be in [0.0, 2.0]");
        }

        if !(self.model.top_p > 0.0 && self.model.top_p <= 1.0) {
            anyhow::bail!("model.top_p must be in (0.0, 1.0]");
        }

        Ok(())
    }
}

/// Replace the port of a `host:port` bind address.
fn with_port(bind: &str, port: &str) -> Result<String> {
    let port: u16 = port
        .parse()
        .with_context(|| format!("{} must be a port number, got '{}'", PORT_ENV, port))?;
    let host = bind.rsplit_once(':').map(|(host, _)| host).unwrap_or(bind);
    Ok(format!("{}:{}", host, port))
}
