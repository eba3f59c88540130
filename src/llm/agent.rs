//! Agent loop for handling conversations with tool execution

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use super::backend::{BackendError, BoundModel, ModelResponse};
use super::provider::{ProviderAdapter, Usage};
use crate::conversation::{Content, Conversation, Turn};
use crate::process::CancellationToken;
use crate::runtime::Runtime;
use crate::tools::ToolRegistry;

/// Result text when the user interrupts a request
pub const CANCELLED_MESSAGE: &str = "Tool execution was cancelled by user.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Unknown agent type: {requested}")]
    UnknownProfile {
        requested: String,
        available: Vec<String>,
    },
}

/// Agent for handling conversations
pub struct Agent {
    adapter: Arc<dyn ProviderAdapter>,
    model: BoundModel,
    tools: ToolRegistry,
    conversation: Conversation,
    cancel: Arc<CancellationToken>,
    total_usage: Usage,
}

impl Agent {
    /// Create an agent with its own conversation and tool set
    pub fn new(runtime: &Runtime, system_prompt: &str, model: &str, tools: ToolRegistry) -> Self {
        let adapter = runtime.adapter().clone();
        let model = adapter.bind_tools(runtime.backend().clone(), model, tools.specs());
        Self {
            conversation: Conversation::new(adapter.create_cached_turn(system_prompt)),
            adapter,
            model,
            tools,
            cancel: runtime.cancel().clone(),
            total_usage: Usage::default(),
        }
    }

    /// Run one user request to completion
    ///
    /// Tool calls are executed one at a time in the order the model emitted
    /// them; the model is re-invoked after every batch until it answers
    /// without tool calls. The cancellation token is left as found: clearing
    /// it is up to whoever starts the top-level request.
    pub async fn chat(&mut self, input: &str) -> Result<String, AgentError> {
        // At most one annotated user turn; a cached memory turn takes the slot
        let content = if self.conversation.annotated_user_turns() == 0 {
            self.adapter.create_cached_turn(input)
        } else {
            Content::from(input)
        };
        self.conversation.push(Turn::user(content));

        loop {
            let response = self.invoke().await?;
            if response.tool_calls.is_empty() {
                let text = response.text.clone();
                self.conversation.push(response.into_turn());
                return Ok(text);
            }

            let calls = response.tool_calls.clone();
            self.conversation.push(response.into_turn());

            for (i, call) in calls.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    // Abandoned calls still get a result so the history stays answerable
                    for skipped in &calls[i..] {
                        self.conversation
                            .push(Turn::tool(skipped.id.clone(), CANCELLED_MESSAGE));
                    }
                    info!("Cancelled with {} tool call(s) pending", calls.len() - i);
                    return Ok(CANCELLED_MESSAGE.to_string());
                }
                let result = self.tools.dispatch(call).await;
                self.conversation.push(Turn::tool(result.call_id, result.content));
            }

            if self.cancel.is_cancelled() {
                info!("Cancelled before re-invoking the model");
                return Ok(CANCELLED_MESSAGE.to_string());
            }
        }
    }

    /// One model call over the full history
    async fn invoke(&mut self) -> Result<ModelResponse, AgentError> {
        debug!("Invoking {} with {} turns", self.model.model(), self.conversation.len());
        let result = self.model.invoke(self.conversation.turns()).await;

        if let Some(turn) = self.conversation.last_user_mut() {
            self.adapter.remove_cache_annotation(turn);
        }

        let response = result.map_err(|e| {
            error!("Model call failed: {}", e);
            AgentError::from(e)
        })?;
        if let Some(usage) = response.usage {
            info!("{}", self.adapter.format_usage(&usage));
            self.total_usage += usage;
        }
        Ok(response)
    }

    /// Drop everything after the system and memory turns
    pub fn reset(&mut self) {
        self.conversation.reset();
        debug!("Conversation reset to {} turn(s)", self.conversation.len());
    }

    /// Install, replace or remove the memory turn
    pub fn set_memory_context(&mut self, context: Option<String>) {
        let content = context.map(|text| self.adapter.create_cached_turn(&text));
        self.conversation.set_memory(content);
    }

    pub fn total_usage(&self) -> Usage {
        self.total_usage
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider_info(&self) -> String {
        format!("{} ({})", self.adapter.name(), self.model.model())
    }
}
