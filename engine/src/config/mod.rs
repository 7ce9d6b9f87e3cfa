//! Configuration management
//!
//! This module handles loading, validation, and management of the Ragroute configuration.
//! Configuration is stored in TOML format at ~/.ragroute/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Judgment oracle provider settings
//! - **search**: Web-search provider settings
//! - **retrieval**: Local document corpus
//! - **workflow**: Retry budgets and collaborator timeouts
//! - **events**: Event feed buffering
//! - **server**: API server bind address
//!
//! API keys are never stored in the file. Each provider section names the
//! environment variable that holds its key.
//!
//! # Examples
//!
//! ```no_run
//! use ragroute_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Default provider: {}", config.llm.default_provider);
//! println!("Generation budget: {}", config.workflow.max_generation_attempts);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard ceiling on generation attempts per run
pub const MAX_GENERATION_ATTEMPTS: u32 = 3;

/// Hard ceiling on web-search attempts per run
pub const MAX_WEB_SEARCH_ATTEMPTS: u32 = 2;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Judgment oracle provider configuration
    pub llm: LLMConfig,

    /// Web-search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Local document corpus
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Workflow budgets and timeouts
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Event feed settings
    #[serde(default)]
    pub events: EventsConfig,

    /// API server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (ollama, openai)
    #[serde(default = "default_llm_provider")]
    pub default_provider: String,

    /// Per-attempt timeout for local providers (seconds)
    #[serde(default = "default_local_timeout")]
    pub local_timeout_secs: u64,

    /// Per-attempt timeout for cloud providers (seconds)
    #[serde(default = "default_cloud_timeout")]
    pub cloud_timeout_secs: u64,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI-compatible provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_llm_provider(),
            local_timeout_secs: default_local_timeout(),
            cloud_timeout_secs: default_cloud_timeout(),
            ollama: OllamaConfig::default(),
            openai: OpenAIConfig::default(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

/// Web-search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Enable web search; when false the stage always falls back
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL for the Tavily API
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Maximum results per query (1-20)
    #[serde(default = "default_search_max_results")]
    pub max_results: u32,

    /// Environment variable holding the API key
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_search_base_url(),
            max_results: default_search_max_results(),
            api_key_env: default_search_key_env(),
        }
    }
}

/// Local document corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// JSON file holding an array of `{content, metadata}` documents (supports ~ expansion)
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// Number of documents returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            top_k: default_top_k(),
        }
    }
}

/// Workflow budgets and collaborator timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Generation attempts per run (at most 3)
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: u32,

    /// Web-search attempts per run (at most 2)
    #[serde(default = "default_max_web_search_attempts")]
    pub max_web_search_attempts: u32,

    /// Timeout for each oracle call (seconds)
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,

    /// Timeout for each retriever call (seconds)
    #[serde(default = "default_collaborator_timeout")]
    pub retriever_timeout_secs: u64,

    /// Timeout for each web-search call (seconds)
    #[serde(default = "default_collaborator_timeout")]
    pub search_timeout_secs: u64,

    /// Capacity of the per-run event delivery queue
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_generation_attempts: default_max_generation_attempts(),
            max_web_search_attempts: default_max_web_search_attempts(),
            oracle_timeout_secs: default_oracle_timeout(),
            retriever_timeout_secs: default_collaborator_timeout(),
            search_timeout_secs: default_collaborator_timeout(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl WorkflowConfig {
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn retriever_timeout(&self) -> Duration {
        Duration::from_secs(self.retriever_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

/// Event feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Bounded channel capacity for each live subscriber
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
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

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<std::net::SocketAddr, EngineError> {
        self.bind
            .parse()
            .map_err(|e| EngineError::Config(format!("Invalid server.bind '{}': {}", self.bind, e)))
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Corpus file looked up in the data directory when none is configured
pub const DEFAULT_CORPUS_FILE: &str = "corpus.json";

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.ragroute")
}

fn default_local_timeout() -> u64 {
    120
}

fn default_cloud_timeout() -> u64 {
    30
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_search_max_results() -> u32 {
    3
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_top_k() -> usize {
    4
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}

fn default_max_generation_attempts() -> u32 {
    MAX_GENERATION_ATTEMPTS
}

fn default_max_web_search_attempts() -> u32 {
    MAX_WEB_SEARCH_ATTEMPTS
}

fn default_oracle_timeout() -> u64 {
    120
}

fn default_collaborator_timeout() -> u64 {
    30
}

fn default_event_queue_capacity() -> usize {
    256
}

fn default_subscriber_buffer() -> usize {
    100
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key_env: default_openai_key_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LLMConfig::default(),
            search: SearchConfig::default(),
            retrieval: RetrievalConfig::default(),
            workflow: WorkflowConfig::default(),
            events: EventsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.ragroute/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        // Serialize before path expansion so the file keeps the portable ~ form
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Corpus file used by the retriever
    ///
    /// An explicit `retrieval.corpus_path` wins; otherwise `corpus.json` in the
    /// data directory is used when it exists.
    pub fn corpus_path(&self) -> Option<PathBuf> {
        self.retrieval.corpus_path.clone().or_else(|| {
            let candidate = self.core.data_dir.join(DEFAULT_CORPUS_FILE);
            candidate.exists().then_some(candidate)
        })
    }

    /// Get the default configuration file path (~/.ragroute/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".ragroute").join("config.toml"))
    }

    /// Validate and process configuration
    ///
    /// Checks enumerated values and numeric ranges, then expands ~ in paths.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["ollama", "openai"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.workflow.max_generation_attempts == 0
            || self.workflow.max_generation_attempts > MAX_GENERATION_ATTEMPTS
        {
            return Err(EngineError::Config(format!(
                "max_generation_attempts must be between 1 and {}",
                MAX_GENERATION_ATTEMPTS
            )));
        }
        if self.workflow.max_web_search_attempts == 0
            || self.workflow.max_web_search_attempts > MAX_WEB_SEARCH_ATTEMPTS
        {
            return Err(EngineError::Config(format!(
                "max_web_search_attempts must be between 1 and {}",
                MAX_WEB_SEARCH_ATTEMPTS
            )));
        }

        if self.llm.local_timeout_secs == 0 || self.llm.cloud_timeout_secs == 0 {
            return Err(EngineError::Config(
                "llm provider timeouts must be greater than zero".to_string(),
            ));
        }

        if self.workflow.oracle_timeout_secs == 0
            || self.workflow.retriever_timeout_secs == 0
            || self.workflow.search_timeout_secs == 0
        {
            return Err(EngineError::Config(
                "workflow timeouts must be greater than zero".to_string(),
            ));
        }

        if self.workflow.event_queue_capacity == 0 || self.events.subscriber_buffer == 0 {
            return Err(EngineError::Config(
                "event_queue_capacity and subscriber_buffer must be greater than zero".to_string(),
            ));
        }

        if !(1..=20).contains(&self.search.max_results) {
            return Err(EngineError::Config(
                "search.max_results must be between 1 and 20".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(EngineError::Config(
                "retrieval.top_k must be greater than zero".to_string(),
            ));
        }

        self.server.bind_addr()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if let Some(corpus) = &self.retrieval.corpus_path {
            self.retrieval.corpus_path = Some(expand_path(corpus)?);
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.default_provider, "ollama");
        assert_eq!(config.workflow.max_generation_attempts, 3);
        assert_eq!(config.workflow.max_web_search_attempts, 2);
        assert_eq!(config.search.max_results, 3);
        assert!(config.search.enabled);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_minimal_toml() {
        let config = Config::from_toml_str(
            r#"
[llm]
default_provider = "openai"
"#,
        )
        .unwrap();
        assert_eq!(config.llm.default_provider, "openai");
        assert_eq!(config.llm.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.workflow.oracle_timeout_secs, 120);
    }

    #[test]
    fn test_budget_above_ceiling_rejected() {
        let err = Config::from_toml_str(
            r#"
[llm]
default_provider = "ollama"

[workflow]
max_generation_attempts = 4
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_generation_attempts"));
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let err = Config::from_toml_str(
            r#"
[llm]
default_provider = "ollama"

[server]
bind = "not-an-address"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(
            config.workflow.search_timeout_secs,
            deserialized.workflow.search_timeout_secs
        );
    }
}
