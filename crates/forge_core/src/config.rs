//! Configuration types for an appforge workspace.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Comprehensive configuration for an appforge workspace.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Conversation memory limits.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Version snapshot policy.
    #[serde(default)]
    pub versioning: VersioningConfig,

    /// Generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Turn handling options.
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl Config {
    /// Load configuration from `config.toml` under the given directory.
    pub fn load(forge_root: &Path) -> Result<Self> {
        let path = forge_root.join("config.toml");
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| ForgeError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| ForgeError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `config.toml` under the given directory.
    pub fn save(&self, forge_root: &Path) -> Result<()> {
        let path = forge_root.join("config.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| ForgeError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| ForgeError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Conversation memory limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Messages retained per context (default: 50).
    pub max_messages: usize,

    /// Contexts retained after idle eviction (default: 10).
    pub max_contexts: usize,

    /// Contexts idle for longer than this are dropped (default: 7).
    pub idle_eviction_days: u64,

    /// Rebuild the rolling summary every N appended messages (default: 10).
    pub summary_interval: usize,

    /// Number of trailing messages the summary looks at (default: 20).
    pub summary_window: usize,

    /// Number of trailing messages rendered into the prompt (default: 10).
    pub prompt_window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: 50,
            max_contexts: 10,
            idle_eviction_days: 7,
            summary_interval: 10,
            summary_window: 20,
            prompt_window: 10,
        }
    }
}

impl MemoryConfig {
    /// Returns the idle eviction window as a Duration.
    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_days * 24 * 60 * 60)
    }
}

/// Version snapshot policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersioningConfig {
    /// A change touching more files than this is major (default: 3).
    pub major_file_threshold: usize,

    /// Optional cap on retained versions per project. `None` keeps all.
    pub max_versions: Option<usize>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            major_file_threshold: 3,
            max_versions: None,
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model identifier.
    pub model: String,

    /// REST base URL (the model name and method are appended).
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Maximum output tokens per request.
    pub max_output_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_output_tokens: 65536,
            temperature: 0.1,
            request_timeout_secs: 300,
        }
    }
}

impl GenerationConfig {
    /// Returns the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Turn handling options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Ask the model for terser, more technical answers.
    pub senior_mode: bool,

    /// Natural language the model should answer in.
    pub response_language: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            senior_mode: false,
            response_language: "English".to_string(),
        }
    }
}
