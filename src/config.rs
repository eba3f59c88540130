//! Configuration loading and validation
//!
//! This module provides:
//! - `AgentRuntimeConfig` - Runtime configuration shared by every agent (library-public)
//! - `Config` - Full application configuration loaded from config.toml (CLI-only)

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

use crate::llm::ProviderKind;
use crate::tools::MAX_OUTPUT_CHARS;

// =============================================================================
// Library-public types (always available)
// =============================================================================

/// File name of the instruction files loaded as memory context
pub const MEMORY_FILE: &str = "SHEPHERD.md";

/// Default foreground shell timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Upper bound accepted for a foreground shell timeout
pub const MAX_TIMEOUT: Duration = Duration::from_millis(600_000);

/// Delay between SIGTERM and SIGKILL
pub const KILL_GRACE: Duration = Duration::from_millis(500);

/// Get the config directory path (~/.config/shepherd)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".config").join("shepherd"))
}

/// Runtime configuration for the agents of one process.
///
/// CLI users get this from `AgentRuntimeConfig::from_config`, library users
/// construct it directly.
///
/// # Example
///
/// ```
/// use shepherd::{AgentRuntimeConfig, ProviderKind};
///
/// let config = AgentRuntimeConfig {
///     provider: ProviderKind::DeepSeek,
///     model: "deepseek-chat".to_string(),
///     ..AgentRuntimeConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub working_dir: PathBuf,
    /// Cap on each tool result, in characters
    pub max_output_chars: usize,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub kill_grace: Duration,
    /// Directory holding user-defined agent profiles
    pub agents_dir: Option<PathBuf>,
    pub show_tokens: bool,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        let provider = ProviderKind::Claude;
        Self {
            provider,
            model: provider.default_model().to_string(),
            max_tokens: 16_384,
            temperature: 0.0,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_output_chars: MAX_OUTPUT_CHARS,
            default_timeout: DEFAULT_TIMEOUT,
            max_timeout: MAX_TIMEOUT,
            kill_grace: KILL_GRACE,
            agents_dir: config_dir().map(|p| p.join("agents")),
            show_tokens: true,
        }
    }
}

// =============================================================================
// CLI-only types (gated behind "cli" feature)
// =============================================================================

#[cfg(feature = "cli")]
impl AgentRuntimeConfig {
    /// Build the runtime config from application Config
    ///
    /// An unset model falls back to the provider's default.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = ProviderKind::from_name(&config.general.provider)?;
        let model = config
            .general
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let working_dir = match &config.general.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to resolve working directory")?,
        };
        Ok(Self {
            provider,
            model,
            max_tokens: config.general.max_tokens,
            temperature: config.general.temperature,
            working_dir,
            max_output_chars: config.shell.max_output_chars,
            default_timeout: Duration::from_millis(config.shell.default_timeout_ms),
            max_timeout: Duration::from_millis(config.shell.max_timeout_ms),
            kill_grace: Duration::from_millis(config.shell.kill_grace_ms),
            agents_dir: config.agents.dir.clone().or_else(|| config_dir().map(|p| p.join("agents"))),
            show_tokens: config.ui.show_tokens,
        })
    }
}

/// Main configuration structure loaded from config.toml
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub shell: ShellConfig,
    pub agents: AgentsConfig,
    pub ui: UiConfig,
}

#[cfg(feature = "cli")]
impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                return Self::parse(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()));
            }
        }
        Ok(Config::default())
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("config.toml"))
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Provider name or alias (claude, sonnet, deepseek, ds, grok, xai)
    pub provider: String,
    /// Model override; defaults to the provider's model
    pub model: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[cfg(feature = "cli")]
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: None,
            working_dir: None,
            max_tokens: 16_384,
            temperature: 0.0,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub kill_grace_ms: u64,
    pub max_output_chars: usize,
}

#[cfg(feature = "cli")]
impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_timeout_ms: MAX_TIMEOUT.as_millis() as u64,
            kill_grace_ms: KILL_GRACE.as_millis() as u64,
            max_output_chars: MAX_OUTPUT_CHARS,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Directory of `*.toml` agent profiles (default ~/.config/shepherd/agents)
    pub dir: Option<PathBuf>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_tokens: bool,
}

#[cfg(feature = "cli")]
impl Default for UiConfig {
    fn default() -> Self {
        Self { show_tokens: true }
    }
}
