//! Model backends, provider adapters and the agent loop

mod agent;
mod backend;
mod delegate;
mod provider;
mod registry;

pub use agent::{Agent, AgentError, CANCELLED_MESSAGE};
pub use backend::{BackendError, BoundModel, ChatBackend, GenaiBackend, ModelResponse};
pub use delegate::delegate;
pub use provider::{
    ClaudeAdapter, DeepSeekAdapter, GrokAdapter, ProviderAdapter, ProviderError, ProviderKind,
    Usage,
};
pub use registry::{AgentCounts, AgentRegistry, ProfileMap};

#[cfg(test)]
pub(crate) use backend::testing;
