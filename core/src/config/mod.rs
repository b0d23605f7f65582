//! Configuration management
//!
//! Loads `config.toml` from the user's config directory. Every field has a
//! serde default so a missing or partial file still yields a usable config.

use crate::error::ShellwiseError;
use crate::llm::{LlmConfig, LlmProvider};
use crate::logger::Level;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name
const CONFIG_DIR_NAME: &str = "shellwise";

/// Environment variable that overrides `endpoint.api_key`
pub const API_KEY_ENV: &str = "SHELLWISE_API_KEY";

const REDACTED: &str = "<redacted>";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model endpoint settings
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Per-session behaviour
    #[serde(default)]
    pub session: SessionConfig,

    /// Replaces the built-in system instruction when set
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Provider kind (`openai`, `ollama`, ...)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// API key, if the endpoint needs one
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Ask the endpoint for structured (JSON) output
    #[serde(default = "default_true")]
    pub json_mode: bool,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: None,
            max_tokens: None,
            json_mode: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Session engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of conversation messages kept per session
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Number of recent terminal lines sent along with a prompt
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    /// Pause after running a reviewed command before showing the next one
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Letter of the ctrl+letter chord that opens an inline AI block
    #[serde(default = "default_trigger_key")]
    pub trigger_key: char,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            context_lines: default_context_lines(),
            settle_delay_ms: default_settle_delay_ms(),
            trigger_key: default_trigger_key(),
        }
    }
}

impl SessionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Raw byte produced by the trigger chord, e.g. `g` -> 0x07.
    pub fn trigger_byte(&self) -> Option<u8> {
        let c = self.trigger_key.to_ascii_lowercase();
        c.is_ascii_lowercase().then(|| c as u8 - b'a' + 1)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write to `debug.log` in the data directory
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: true,
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::Info)
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_history_limit() -> usize {
    20
}

fn default_context_lines() -> usize {
    40
}

fn default_settle_delay_ms() -> u64 {
    400
}

fn default_trigger_key() -> char {
    'g'
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a specific file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from TOML text and apply environment overrides
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from the default location, or defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                let mut config = Self::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        if config.endpoint.api_key.is_some() {
            config.endpoint.api_key = Some(REDACTED.to_string());
        }
        config
    }

    /// `$XDG_CONFIG_HOME/shellwise/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Directory for the debug log
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.endpoint.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ShellwiseError> {
        if self.endpoint.model.trim().is_empty() {
            return Err(ShellwiseError::InvalidConfig {
                message: "endpoint.model must not be empty".to_string(),
            });
        }
        if self.endpoint.base_url.trim().is_empty() {
            return Err(ShellwiseError::InvalidConfig {
                message: "endpoint.base_url must not be empty".to_string(),
            });
        }
        self.endpoint.provider.parse::<LlmProvider>()?;
        if self.session.history_limit == 0 {
            return Err(ShellwiseError::InvalidConfig {
                message: "session.history_limit must be at least 1".to_string(),
            });
        }
        if self.session.trigger_byte().is_none() {
            return Err(ShellwiseError::InvalidConfig {
                message: format!(
                    "session.trigger_key must be a letter, got {:?}",
                    self.session.trigger_key
                ),
            });
        }
        Ok(())
    }

    /// Build the transport configuration for the configured endpoint
    pub fn llm_config(&self) -> std::result::Result<LlmConfig, ShellwiseError> {
        let provider: LlmProvider = self.endpoint.provider.parse()?;
        let mut llm = LlmConfig::new(
            provider,
            self.endpoint.base_url.trim_end_matches('/').to_string(),
            self.endpoint.model.clone(),
            self.endpoint.api_key.clone(),
        )
        .with_timeout(Duration::from_secs(self.endpoint.timeout_secs));
        if let Some(tokens) = self.endpoint.max_tokens {
            llm = llm.with_max_tokens(tokens);
        }
        if let Some(temp) = self.endpoint.temperature {
            llm = llm.with_temperature(temp);
        }
        Ok(llm)
    }
}
