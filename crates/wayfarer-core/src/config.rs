//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WayfarerError};

/// Top-level Wayfarer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentDefaults>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_iterations: Option<u32>,
}

// --- Typed provider config ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<ProviderConfig>>,
}

/// Configuration for a single LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "openai", "openrouter", or "ollama".
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key: check `api_key` field first, then `api_key_env` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }

    /// Provider used when the config names none: OpenAI keyed by `OPENAI_API_KEY`.
    pub fn openai_from_env() -> Self {
        Self {
            id: "openai".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            api_key: None,
            base_url: None,
            default_model: None,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Allowed CORS origins; `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Delay between canned messages on the preview stream.
    #[serde(default = "default_preview_delay_ms")]
    pub preview_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: None,
            cors_origins: default_cors_origins(),
            preview_delay_ms: default_preview_delay_ms(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_preview_delay_ms() -> u64 {
    1000
}

/// Built-in tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Search backend for `search_attractions` (SearXNG or Brave).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "wayfarer_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env reference pattern is valid"));

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        json5::from_str(&substituted).map_err(|e| WayfarerError::Config(e.to_string()))
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    fn agent_defaults(&self) -> Option<&AgentDefaults> {
        self.agent.as_ref()
    }

    /// Server port.
    pub fn server_port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or_else(default_port)
    }

    /// Server bind address.
    pub fn server_bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.server
            .as_ref()
            .map(|s| s.cors_origins.clone())
            .unwrap_or_else(default_cors_origins)
    }

    pub fn preview_delay_ms(&self) -> u64 {
        self.server
            .as_ref()
            .map(|s| s.preview_delay_ms)
            .unwrap_or_else(default_preview_delay_ms)
    }

    /// Model name: agent override, then the provider's default, then `gpt-4`.
    pub fn default_model(&self) -> String {
        self.agent_defaults()
            .and_then(|d| d.model.clone())
            .or_else(|| self.first_provider().and_then(|p| p.default_model.clone()))
            .unwrap_or_else(|| "gpt-4".to_string())
    }

    pub fn max_tokens(&self) -> u32 {
        self.agent_defaults().and_then(|d| d.max_tokens).unwrap_or(2048)
    }

    pub fn max_tool_iterations(&self) -> u32 {
        self.agent_defaults()
            .and_then(|d| d.max_tool_iterations)
            .unwrap_or(8)
    }

    pub fn temperature(&self) -> f64 {
        self.agent_defaults().and_then(|d| d.temperature).unwrap_or(0.7)
    }

    /// Get the first provider config.
    pub fn first_provider(&self) -> Option<&ProviderConfig> {
        self.models
            .as_ref()
            .and_then(|m| m.providers.as_ref())
            .and_then(|p| p.first())
    }

    /// The provider to plan with: the first configured one, else OpenAI from env.
    pub fn active_provider(&self) -> ProviderConfig {
        self.first_provider()
            .cloned()
            .unwrap_or_else(ProviderConfig::openai_from_env)
    }

    pub fn search_api_url(&self) -> Option<String> {
        self.tools
            .as_ref()
            .and_then(|t| t.search_api_url.clone())
            .filter(|s| !s.is_empty())
    }

    pub fn search_api_key(&self) -> Option<String> {
        self.tools
            .as_ref()
            .and_then(|t| t.search_api_key.clone())
            .filter(|s| !s.is_empty())
    }

    /// Get a config value by dotted path (e.g. "server.port", "agent.model").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> Result<()> {
        if path.is_empty() {
            return Err(WayfarerError::Config("Empty path".into()));
        }

        let mut json = serde_json::to_value(&*self)?;
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| WayfarerError::Config("Empty path".into()))?;

        let mut current = &mut json;
        for segment in parents {
            current = current
                .as_object_mut()
                .map(|obj| {
                    obj.entry(segment.to_string())
                        .or_insert_with(|| serde_json::json!({}))
                })
                .ok_or_else(|| {
                    WayfarerError::Config(format!("Cannot descend into non-object at '{segment}'"))
                })?;
        }

        match current.as_object_mut() {
            Some(obj) => {
                obj.insert(last.to_string(), value);
            }
            None => {
                return Err(WayfarerError::Config(format!(
                    "Cannot set '{last}' on a non-object"
                )));
            }
        }

        *self = serde_json::from_value(json)
            .map_err(|e| WayfarerError::Config(format!("Config deserialization error: {e}")))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let provider = self.active_provider();
        if !matches!(provider.id.as_str(), "openai" | "openrouter" | "ollama") {
            errors.push(format!("Unsupported provider '{}'", provider.id));
        }
        if provider.id != "ollama" && provider.resolve_api_key().is_none() {
            warnings.push(format!("Provider '{}' has no API key configured", provider.id));
        }

        if self.server.as_ref().is_some_and(|s| s.port == 0) {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.max_tool_iterations() == 0 {
            errors.push("agent.max_tool_iterations must be at least 1".to_string());
        }

        if self.search_api_url().is_none() {
            warnings.push(
                "No search API configured; search_attractions will report itself unavailable"
                    .to_string(),
            );
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Wayfarer data: `~/.wayfarer/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wayfarer")
}
