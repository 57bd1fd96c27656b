#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Environment variable that overrides the API key from the config file.
pub const API_KEY_ENV: &str = "AIPIPE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub app_name: String,
    pub debug: bool,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub forum: ForumConfig,
    pub paths: PathsConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to, e.g. "0.0.0.0:8000"
    pub bind: String,
    /// Directory served as the static landing page
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the OpenAI-compatible hosted API
    pub base_url: String,
    /// Bearer token; overridable via `AIPIPE_API_KEY`
    pub api_key: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub embedding_dimension: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForumConfig {
    /// Base URL of the Discourse forum
    pub base_url: String,
    /// Value of the `_t` auth cookie, extracted from a logged-in browser
    pub auth_token: String,
    /// Value of the `_forum_session` cookie
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Output directory for crawled course-content pages
    pub course_content_dir: PathBuf,
    /// Output directory for scraped forum posts
    pub forum_content_dir: PathBuf,
    /// Checkpoint journal for resumable forum scraping
    pub checkpoint_file: PathBuf,
    /// Directory holding the formatted knowledge-base file
    pub kb_dir: PathBuf,
    /// Knowledge base with embeddings, loaded into the vector store at startup
    pub embeddings_file: PathBuf,
    /// Daily API-call logs
    pub api_log_dir: PathBuf,
    /// Incoming-question archive
    pub question_log_dir: PathBuf,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            app_name: "TDS TA - May '25 Project".to_string(),
            debug: false,
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            forum: ForumConfig::default(),
            paths: PathsConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Default for ServerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Default for ApiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: "https://aipipe.org/openai/v1".to_string(),
            api_key: String::new(),
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_dimension: 1536,
        }
    }
}

impl Default for ForumConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: "https://discourse.onlinedegree.iitm.ac.in".to_string(),
            auth_token: String::new(),
            session_token: String::new(),
        }
    }
}

impl Default for PathsConfig {
    #[inline]
    fn default() -> Self {
        Self {
            course_content_dir: PathBuf::from("scraping-output/course_content"),
            forum_content_dir: PathBuf::from("scraping-output/discourse_content"),
            checkpoint_file: PathBuf::from("scraping-output/discourse-journal.jsonl"),
            kb_dir: PathBuf::from("scraping-output"),
            embeddings_file: PathBuf::from("scraping-output/kb_with_embeddings.json"),
            api_log_dir: PathBuf::from("LOGS/API-CALL-LOGS"),
            question_log_dir: PathBuf::from("LOGS/QA-ARCHIVE"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid bind address: {0}")]
    InvalidBind(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from `config.toml` in the given directory.
    ///
    /// A missing file yields the defaults; the `AIPIPE_API_KEY` environment
    /// variable takes precedence over the file value either way.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Config::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.api.api_key = key.trim().to_string();
            }
        }

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.api.base_url.clone()))?;
        Url::parse(&self.forum.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.forum.base_url.clone()))?;

        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind(self.server.bind.clone()))?;

        if self.api.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.api.embedding_model.clone()));
        }
        if self.api.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.api.chat_model.clone()));
        }

        if !(64..=4096).contains(&self.api.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.api.embedding_dimension,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Directory holding the LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }

    /// Crash-resilient side file written while embeddings are generated
    #[inline]
    pub fn embeddings_scratch_path(&self) -> PathBuf {
        self.paths.embeddings_file.with_extension("partial.jsonl")
    }
}
