//! Shepherd - a coding assistant that drives a model through tool calls
//!
//! The crate can be used as a library: build a [`Runtime`], ask it for an
//! [`Agent`] and call [`Agent::chat`].
//!
//! # Example
//!
//! ```no_run
//! use shepherd::{AgentRuntimeConfig, Runtime};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Runtime::live(AgentRuntimeConfig::default())?;
//!     let mut agent = runtime.main_agent();
//!
//!     let answer = agent.chat("What does src/main.rs do?").await?;
//!     println!("{}", answer);
//!
//!     runtime.processes().kill_all().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conversation;
pub mod llm;
pub mod memory;
pub mod process;
pub mod profiles;
pub mod prompts;
pub mod runtime;
pub mod tools;

// Re-export the public API
pub use config::AgentRuntimeConfig;
#[cfg(feature = "cli")]
pub use config::Config;
pub use conversation::{Content, Conversation, Role, ToolCall, Turn};
pub use llm::{
    delegate, Agent, AgentError, AgentRegistry, BackendError, ChatBackend, ModelResponse,
    ProviderAdapter, ProviderError, ProviderKind, Usage,
};
pub use process::{CancellationToken, ProcessRegistry};
pub use profiles::{AgentProfile, ProfileSource, TomlProfileSource};
pub use runtime::Runtime;
pub use tools::{Tool, ToolRegistry};
