//! Provider adapters
//!
//! Each backend family differs in how it wants prompt caching expressed and
//! how it reports token usage. The agent loop talks to a `ProviderAdapter`
//! and never inspects the family directly.

use std::sync::Arc;

use thiserror::Error;

use super::backend::{BoundModel, ChatBackend};
use crate::conversation::{CacheControl, Content, Role, Turn};
use crate::tools::ToolSpec;

/// Errors raised while selecting or constructing a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider '{name}'. Available: {}", available.join(", "))]
    Unknown {
        name: String,
        available: Vec<&'static str>,
    },
    #[error("{var} environment variable is required")]
    MissingApiKey { var: &'static str },
}

/// Backend families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Claude,
    DeepSeek,
    Grok,
}

/// Accepted provider names, in display order
const ALIASES: &[(&str, ProviderKind)] = &[
    ("claude", ProviderKind::Claude),
    ("sonnet", ProviderKind::Claude),
    ("deepseek", ProviderKind::DeepSeek),
    ("ds", ProviderKind::DeepSeek),
    ("grok", ProviderKind::Grok),
    ("xai", ProviderKind::Grok),
];

impl ProviderKind {
    /// Resolve a provider by name or alias, ignoring case
    pub fn from_name(name: &str) -> Result<Self, ProviderError> {
        let lower = name.to_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ProviderError::Unknown {
                name: lower,
                available: Self::available(),
            })
    }

    pub fn available() -> Vec<&'static str> {
        ALIASES.iter().map(|(alias, _)| *alias).collect()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::DeepSeek => "DeepSeek",
            Self::Grok => "Grok",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Claude => "claude-sonnet-4-20250514",
            Self::DeepSeek => "deepseek-chat",
            Self::Grok => "grok-code-fast-1",
        }
    }

    /// Environment variable holding the credential for this family
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Claude => "ANTHROPIC_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Grok => "XAI_API_KEY",
        }
    }

    /// Fail early when the credential is absent or empty
    pub fn check_credentials(&self) -> Result<(), ProviderError> {
        match std::env::var(self.api_key_var()) {
            Ok(value) if !value.trim().is_empty() => Ok(()),
            _ => Err(ProviderError::MissingApiKey {
                var: self.api_key_var(),
            }),
        }
    }

    /// Build the adapter for this family
    pub fn adapter(&self) -> Arc<dyn ProviderAdapter> {
        match self {
            Self::Claude => Arc::new(ClaudeAdapter),
            Self::DeepSeek => Arc::new(DeepSeekAdapter),
            Self::Grok => Arc::new(GrokAdapter),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Token usage tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Uncached input tokens
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Tokens served from the prompt cache
    pub cache_read_tokens: u32,
    /// Tokens written to the prompt cache
    pub cache_creation_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_creation_tokens
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
    }
}

/// Per-family behavior consumed by the agent loop
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Content for a fresh user turn, cache-annotated where the family wants it
    fn create_cached_turn(&self, text: &str) -> Content;

    /// Strip the cache annotation from a turn after the request that used it
    fn remove_cache_annotation(&self, turn: &mut Turn);

    /// One-line usage summary for display
    fn format_usage(&self, usage: &Usage) -> String;

    /// Bind a tool set to a model on the given backend
    fn bind_tools(
        &self,
        backend: Arc<dyn ChatBackend>,
        model: &str,
        tools: Vec<ToolSpec>,
    ) -> BoundModel {
        BoundModel::new(backend, model, tools)
    }

    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    fn default_model(&self) -> &'static str {
        self.kind().default_model()
    }
}

/// Anthropic models: explicit ephemeral cache blocks
pub struct ClaudeAdapter;

impl ProviderAdapter for ClaudeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn create_cached_turn(&self, text: &str) -> Content {
        Content::Block {
            text: text.to_string(),
            cache: Some(CacheControl::Ephemeral),
        }
    }

    fn remove_cache_annotation(&self, turn: &mut Turn) {
        if turn.role == Role::User {
            turn.content.clear_cache();
        }
    }

    fn format_usage(&self, usage: &Usage) -> String {
        format!(
            "Tokens - Input: {} (cached: {}) Output: {}",
            usage.input_tokens, usage.cache_read_tokens, usage.output_tokens
        )
    }
}

/// DeepSeek caches prefixes automatically
pub struct DeepSeekAdapter;

impl ProviderAdapter for DeepSeekAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DeepSeek
    }

    fn create_cached_turn(&self, text: &str) -> Content {
        Content::Text(text.to_string())
    }

    fn remove_cache_annotation(&self, _turn: &mut Turn) {}

    fn format_usage(&self, usage: &Usage) -> String {
        plain_usage(usage)
    }
}

/// xAI caches prefixes automatically
pub struct GrokAdapter;

impl ProviderAdapter for GrokAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Grok
    }

    fn create_cached_turn(&self, text: &str) -> Content {
        Content::Text(text.to_string())
    }

    fn remove_cache_annotation(&self, _turn: &mut Turn) {}

    fn format_usage(&self, usage: &Usage) -> String {
        plain_usage(usage)
    }
}

fn plain_usage(usage: &Usage) -> String {
    format!(
        "Tokens - Input: {} Output: {}",
        usage.input_tokens, usage.output_tokens
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aliases_case_insensitive() {
        assert_eq!(ProviderKind::from_name("Sonnet").unwrap(), ProviderKind::Claude);
        assert_eq!(ProviderKind::from_name("DS").unwrap(), ProviderKind::DeepSeek);
        assert_eq!(ProviderKind::from_name("xai").unwrap(), ProviderKind::Grok);
    }

    #[test]
    fn test_unknown_provider_lists_names() {
        let err = ProviderKind::from_name("gpt").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Unknown provider 'gpt'"));
        for name in ["claude", "sonnet", "deepseek", "ds", "grok", "xai"] {
            assert!(msg.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_claude_cache_roundtrip() {
        let adapter = ClaudeAdapter;
        let mut turn = Turn::user(adapter.create_cached_turn("hello"));
        assert!(turn.content.is_cache_annotated());
        adapter.remove_cache_annotation(&mut turn);
        assert!(!turn.content.is_cache_annotated());
        assert_eq!(turn.text(), "hello");
    }

    #[test]
    fn test_auto_cache_families_are_plain() {
        for adapter in [ProviderKind::DeepSeek.adapter(), ProviderKind::Grok.adapter()] {
            let content = adapter.create_cached_turn("x");
            assert_eq!(content, Content::Text("x".to_string()));
        }
    }

    #[test]
    fn test_format_usage() {
        let usage = Usage {
            input_tokens: 10,
            output_tokens: 5,
            cache_read_tokens: 3,
            cache_creation_tokens: 0,
        };
        assert_eq!(
            ClaudeAdapter.format_usage(&usage),
            "Tokens - Input: 10 (cached: 3) Output: 5"
        );
        assert_eq!(GrokAdapter.format_usage(&usage), "Tokens - Input: 10 Output: 5");
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            input_tokens: 1,
            output_tokens: 2,
            cache_read_tokens: 3,
            cache_creation_tokens: 4,
        };
        total += Usage {
            input_tokens: 1,
            ..Default::default()
        };
        assert_eq!(total.input_tokens, 2);
        assert_eq!(total.total(), 11);
    }
}
