//! # Application Configuration
//!
//! Defines the configuration structure for `docchat-server` and the logic for
//! loading it from a `config.yml` file and environment variables. `${VAR}`
//! references in the file are substituted from the environment before parsing,
//! and `DOCCHAT_`-prefixed variables override nested keys.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// An error from the underlying `config` crate.
    General(String),
    /// A required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The path to the SQLite database file. Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Where uploaded files are staged and kept.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Connection settings for the vector index.
    pub vector_index: VectorIndexConfig,
    /// Configuration for the text embedding model.
    pub embedding: EmbeddingConfig,
    /// A map of named, reusable chat provider configurations.
    pub providers: HashMap<String, ProviderConfig>,
    /// Which provider the pipeline uses, and at what temperature.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Retrieval pipeline tuning.
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    /// Ingestion defaults.
    #[serde(default)]
    pub ingestion: IngestionSettingsConfig,
}

fn default_port() -> u16 {
    9090
}
fn default_db_url() -> String {
    "db/docchat.db".to_string()
}
fn default_upload_dir() -> String {
    "uploads".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorIndexConfig {
    pub api_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dense_dim")]
    pub dense_dim: usize,
    #[serde(default)]
    pub rerank_api_url: Option<String>,
}

fn default_collection() -> String {
    "docs_collection".to_string()
}
fn default_dense_dim() -> usize {
    1024
}

/// Configuration for the embedding model provider.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model_name: String,
    pub api_key: Option<String>,
}

/// A reusable configuration for a specific chat provider instance.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// The type of provider ("openai" or "gemini").
    pub provider: String,
    /// The API URL. Optional for Gemini, where it can be derived from the
    /// model name.
    pub api_url: Option<String>,
    /// The API key, which can be null for local providers.
    pub api_key: Option<String>,
    pub model_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_provider")]
    pub provider: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_chat_provider(),
            temperature: default_temperature(),
        }
    }
}

fn default_chat_provider() -> String {
    "default".to_string()
}
fn default_temperature() -> f32 {
    0.7
}

/// Tuning for the retrieval pipeline. The gate vote rule and the rewrite
/// retry bound ship with the values the pipeline was tuned with; both are
/// plain configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalSettings {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_rewrite_count")]
    pub rewrite_count: usize,
    #[serde(default = "default_rewrite_max_attempts")]
    pub rewrite_max_attempts: u32,
    #[serde(default)]
    pub gate_enabled: bool,
    #[serde(default)]
    pub use_reranker: bool,
    /// "llm" for per-chunk LLM judgments, "threshold" to keep chunks whose
    /// search score clears `judge_threshold`.
    #[serde(default = "default_judge_strategy")]
    pub judge_strategy: String,
    #[serde(default = "default_judge_threshold")]
    pub judge_threshold: f64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_stage_deadline_secs")]
    pub stage_deadline_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rewrite_count: default_rewrite_count(),
            rewrite_max_attempts: default_rewrite_max_attempts(),
            gate_enabled: false,
            use_reranker: false,
            judge_strategy: default_judge_strategy(),
            judge_threshold: default_judge_threshold(),
            call_timeout_secs: default_call_timeout_secs(),
            stage_deadline_secs: default_stage_deadline_secs(),
        }
    }
}

fn default_top_k() -> u32 {
    5
}
fn default_rewrite_count() -> usize {
    3
}
fn default_rewrite_max_attempts() -> u32 {
    3
}
fn default_judge_strategy() -> String {
    "llm".to_string()
}
fn default_judge_threshold() -> f64 {
    0.85
}
fn default_call_timeout_secs() -> u64 {
    30
}
fn default_stage_deadline_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionSettingsConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
}

impl Default for IngestionSettingsConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            chunk_size: default_chunk_size(),
            overlap_size: default_overlap_size(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    ["txt", "md", "markdown", "pdf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_chunk_size() -> usize {
    150
}
fn default_overlap_size() -> usize {
    20
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").unwrap();
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        let var_name = &caps["var"];
        env::var(var_name).unwrap_or_else(|_| "".to_string())
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the application configuration from a file and environment variables.
///
/// - Top-level keys like `port` and `db_url` are overridden by `PORT` and `DB_URL`.
/// - Nested keys are overridden by `DOCCHAT_...` variables
///   (e.g., `DOCCHAT_EMBEDDING__API_URL`).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let base_path = env!("CARGO_MANIFEST_DIR");
    let main_config_path = match config_path_override {
        Some(override_path) => override_path.to_string(),
        None => format!("{base_path}/config.yml"),
    };

    let main_content = read_and_substitute(&main_config_path)?.ok_or_else(|| {
        ConfigError::NotFound(format!(
            "Main config file not found at '{main_config_path}'. Please create 'config.yml'."
        ))
    })?;

    info!("Loading configuration from '{main_config_path}'.");

    let settings = ConfigBuilder::builder()
        .add_source(File::from_str(&main_content, FileFormat::Yaml))
        // Environment variables for top-level keys like PORT.
        .add_source(Environment::default())
        // Prefixed environment variables for deeper overrides.
        .add_source(
            Environment::with_prefix("DOCCHAT")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
