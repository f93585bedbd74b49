//! Configuration management for Conclave
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (CONCLAVE_*)
//! 3. Config file (~/.config/conclave/config.toml)
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Agent-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Path to the review agent executable
    pub agent_path: String,

    /// Model identifier passed to the agent and mixed into cache keys
    pub model: Option<String>,

    /// Environment variable holding the provider API key
    pub api_key_env: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            agent_path: "conclave-agent".to_string(),
            model: None,
            api_key_env: "CONCLAVE_API_KEY".to_string(),
        }
    }
}

/// Review orchestration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Upper bound on concurrent in-flight reviews for large batches
    pub max_concurrent_reviews: usize,

    /// Whether review results are cached
    pub enable_cache: bool,

    /// Whether per-job audit trails are captured
    pub audit: bool,

    /// Base delay before the first rate-limit retry (doubles per retry)
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            max_concurrent_reviews: 8,
            enable_cache: true,
            audit: false,
            retry_base_delay: Duration::from_secs(5),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Agent configuration
    pub agent: AgentSettings,
    /// Review orchestration configuration
    pub review: ReviewSettings,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/conclave/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("conclave").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - CONCLAVE_AGENT_PATH: Path to the review agent executable
    /// - CONCLAVE_MODEL: Model to use
    /// - CONCLAVE_MAX_CONCURRENT: Concurrency cap for large batches
    /// - CONCLAVE_AUDIT: Enable audit capture ("true"/"1")
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(agent_path) = std::env::var("CONCLAVE_AGENT_PATH") {
            self.agent.agent_path = agent_path;
        }

        if let Ok(model) = std::env::var("CONCLAVE_MODEL") {
            self.agent.model = Some(model);
        }

        if let Ok(max) = std::env::var("CONCLAVE_MAX_CONCURRENT") {
            if let Ok(max) = max.parse() {
                self.review.max_concurrent_reviews = max;
            }
        }

        if let Ok(audit) = std::env::var("CONCLAVE_AUDIT") {
            self.review.audit = matches!(audit.as_str(), "true" | "1" | "yes" | "on");
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, agent_path: Option<String>, model: Option<String>) -> Self {
        if let Some(path) = agent_path {
            self.agent.agent_path = path;
        }

        if let Some(m) = model {
            self.agent.model = Some(m);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(agent_path: Option<String>, model: Option<String>) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(agent_path, model))
    }

    /// Model identifier used for cache keying when none is configured
    pub fn model_id(&self) -> &str {
        self.agent.model.as_deref().unwrap_or("unknown")
    }
}
