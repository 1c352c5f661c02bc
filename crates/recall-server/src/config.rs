//! Configuration file support

use recall_ai::OpenAIConfig;
use recall_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Configuration for the recall server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model identifier sent to the backend
    pub model: String,
    /// Base URL of the OpenAI-compatible backend
    pub base_url: String,
    /// Bearer token for the backend
    pub api_key: Option<String>,
    /// Number of messages kept verbatim in the window
    pub window_size: usize,
    /// System prompt; empty means none
    pub system_prompt: String,
    /// Sampling temperature; omitted from requests when unset
    pub temperature: Option<f32>,
    /// Base URL for relative attachment references
    pub attachment_base_url: String,
    /// Deadline for summarization calls and for opening a stream
    pub request_timeout_secs: u64,
    /// Longest silence tolerated inside a stream
    pub stream_idle_timeout_secs: u64,
    /// Address to listen on
    pub listen: String,
    /// Directory for conversation logs
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            window_size: 4,
            system_prompt: String::new(),
            temperature: None,
            attachment_base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 120,
            stream_idle_timeout_secs: 60,
            listen: "0.0.0.0:3000".to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recall")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RECALL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        Self::default().save()?;
        Ok(path)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CHAT_MODEL") {
            self.model = v;
        }
        if let Some(v) = lookup("BACKEND_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("BACKEND_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "WINDOW_SIZE") {
            self.window_size = v;
        }
        if let Some(v) = lookup("SYSTEM_PROMPT") {
            self.system_prompt = v;
        }
        if let Some(v) = parse_var(&lookup, "MODEL_TEMPERATURE") {
            self.temperature = Some(v);
        }
        if let Some(v) = lookup("ATTACHMENT_BASE_URL") {
            self.attachment_base_url = v;
        }
        if let Some(v) = parse_var(&lookup, "BACKEND_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = lookup("RECALL_LISTEN") {
            self.listen = v;
        }
        if let Some(v) = lookup("RECALL_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
    }

    /// Directory for conversation logs
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("recall")
                .join("conversations")
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model: self.model.clone(),
            capacity: self.window_size,
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            attachment_base_url: self.attachment_base_url.clone(),
        }
    }

    /// Backend client settings; a zero deadline is rejected
    pub fn backend_config(&self) -> anyhow::Result<OpenAIConfig> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        if self.stream_idle_timeout_secs == 0 {
            anyhow::bail!("stream_idle_timeout_secs must be at least 1");
        }
        Ok(OpenAIConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            stream_idle_timeout: Duration::from_secs(self.stream_idle_timeout_secs),
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: {:?} is not a valid value", key, raw);
            None
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# recall configuration file
# Place at ~/.config/recall/config.toml or point RECALL_CONFIG_PATH at it.
# Every key can also be set through the environment (shown in brackets).

# Model identifier sent to the backend [CHAT_MODEL]
model = "default"

# OpenAI-compatible backend [BACKEND_URL, BACKEND_API_KEY]
base_url = "http://localhost:8000/v1"
# api_key = "sk-..."

# Messages kept verbatim before older ones are summarized [WINDOW_SIZE]
window_size = 4

# System prompt, empty for none [SYSTEM_PROMPT]
system_prompt = ""

# Sampling temperature, omitted when unset [MODEL_TEMPERATURE]
# temperature = 0.7

# Base for relative attachment references such as /uploads/a.png [ATTACHMENT_BASE_URL]
attachment_base_url = "http://localhost:3000"

# Deadlines in seconds [BACKEND_TIMEOUT_SECS]
request_timeout_secs = 120
stream_idle_timeout_secs = 60

# HTTP listener [RECALL_LISTEN] and log directory [RECALL_DATA_DIR]
listen = "0.0.0.0:3000"
# data_dir = "/var/lib/recall/conversations"
"#
}
