//! Chat backend seam
//!
//! `ChatBackend` turns a conversation plus tool specs into one model
//! response. `GenaiBackend` is the live implementation over the genai
//! multi-provider client; the adapter family is picked by genai from the
//! model name.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{
    CacheControl as GenaiCacheControl, ChatMessage, ChatOptions, ChatRequest, ChatRole,
    ChatStreamEvent, ContentPart, MessageContent, Tool, ToolCall as GenaiToolCall, ToolResponse,
};
use genai::Client;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use super::provider::Usage;
use crate::conversation::{Role, ToolCall, Turn};
use crate::tools::ToolSpec;

/// Failures talking to the model backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API error ({model}): {message}")]
    Request { model: String, message: String },
    #[error("Stream error: {0}")]
    Stream(String),
}

/// A single model reply, collected from the stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
            usage: None,
        }
    }

    /// Convert into the assistant turn recorded in the conversation
    pub fn into_turn(self) -> Turn {
        Turn::assistant(self.text, self.tool_calls)
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, BackendError>;
}

/// A model with its tool set bound
#[derive(Clone)]
pub struct BoundModel {
    backend: Arc<dyn ChatBackend>,
    model: String,
    tools: Vec<ToolSpec>,
}

impl BoundModel {
    pub fn new(backend: Arc<dyn ChatBackend>, model: &str, tools: Vec<ToolSpec>) -> Self {
        Self {
            backend,
            model: model.to_string(),
            tools,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub async fn invoke(&self, turns: &[Turn]) -> Result<ModelResponse, BackendError> {
        self.backend.complete(&self.model, turns, &self.tools).await
    }
}

/// Live backend over the genai client
pub struct GenaiBackend {
    client: Client,
    max_tokens: u32,
    temperature: f64,
}

impl GenaiBackend {
    pub fn new(max_tokens: u32, temperature: f64) -> Self {
        Self {
            client: Client::default(),
            max_tokens,
            temperature,
        }
    }

    fn to_messages(turns: &[Turn]) -> Vec<ChatMessage> {
        turns.iter().map(to_message).collect()
    }

    fn to_tools(tools: &[ToolSpec]) -> Vec<Tool> {
        tools
            .iter()
            .map(|spec| {
                Tool::new(spec.name.clone())
                    .with_description(spec.description.clone())
                    .with_schema(spec.schema.clone())
            })
            .collect()
    }
}

fn to_message(turn: &Turn) -> ChatMessage {
    let mut msg = match turn.role {
        Role::System => ChatMessage::system(turn.text()),
        Role::User => ChatMessage::user(turn.text()),
        Role::Assistant => {
            let mut content = MessageContent::default();
            if !turn.text().is_empty() {
                content = content.append(ContentPart::Text(turn.text().to_string()));
            }
            for call in &turn.tool_calls {
                content = content.append(ContentPart::ToolCall(GenaiToolCall {
                    call_id: call.id.clone(),
                    fn_name: call.name.clone(),
                    fn_arguments: Value::Object(call.args.clone()),
                }));
            }
            ChatMessage {
                role: ChatRole::Assistant,
                content,
                options: None,
            }
        },
        Role::Tool => ChatMessage::from(ToolResponse::new(
            turn.tool_call_id.clone().unwrap_or_default(),
            turn.text().to_string(),
        )),
    };
    if turn.content.is_cache_annotated() {
        msg.options = Some(GenaiCacheControl::Ephemeral.into());
    }
    msg
}

fn from_genai_call(call: GenaiToolCall) -> ToolCall {
    let args = match call.fn_arguments {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            debug!("Non-object tool arguments for {}: {}", call.fn_name, other);
            Map::new()
        },
    };
    ToolCall::new(call.call_id, call.fn_name, args)
}

/// Convert genai usage for a single response
fn usage_from_genai(usage: &genai::chat::Usage) -> Usage {
    let mut out = Usage {
        input_tokens: usage.prompt_tokens.unwrap_or(0) as u32,
        output_tokens: usage.completion_tokens.unwrap_or(0) as u32,
        ..Default::default()
    };
    if let Some(ref details) = usage.prompt_tokens_details {
        out.cache_creation_tokens = details.cache_creation_tokens.unwrap_or(0) as u32;
        out.cache_read_tokens = details.cached_tokens.unwrap_or(0) as u32;
    }
    out
}

#[async_trait]
impl ChatBackend for GenaiBackend {
    async fn complete(
        &self,
        model: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, BackendError> {
        let mut request = ChatRequest::new(Self::to_messages(turns));
        if !tools.is_empty() {
            request = request.with_tools(Self::to_tools(tools));
        }
        let options = ChatOptions::default()
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_capture_usage(true)
            .with_capture_tool_calls(true);

        debug!("Chat request: model={}, turns={}, tools={}", model, turns.len(), tools.len());
        let resp = self
            .client
            .exec_chat_stream(model, request, Some(&options))
            .await
            .map_err(|e| {
                let message = format!("{:#}", e);
                error!("Chat request failed: {}", message);
                BackendError::Request {
                    model: model.to_string(),
                    message,
                }
            })?;
        info!("Chat request successful");

        let mut response = ModelResponse::default();
        let mut stream = resp.stream;
        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => response.text.push_str(&chunk.content),
                Ok(ChatStreamEvent::End(end)) => {
                    response.usage = end.captured_usage.as_ref().map(usage_from_genai);
                    if let Some(calls) = end.captured_into_tool_calls() {
                        response.tool_calls = calls.into_iter().map(from_genai_call).collect();
                    }
                },
                Ok(_) => {},
                Err(e) => {
                    error!("Stream error: {:?}", e);
                    return Err(BackendError::Stream(format!("{:?}", e)));
                },
            }
        }
        debug!(
            "Response collected: text_len={}, tool_calls={}",
            response.text.len(),
            response.tool_calls.len()
        );
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend for exercising the loop without a network

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub struct ScriptedBackend {
        script: Mutex<VecDeque<Result<ModelResponse, BackendError>>>,
        requests: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedBackend {
        pub fn new(script: Vec<Result<ModelResponse, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn replies(replies: Vec<ModelResponse>) -> Arc<Self> {
            Self::new(replies.into_iter().map(Ok).collect())
        }

        /// Conversation snapshots seen by each call
        pub fn requests(&self) -> Vec<Vec<Turn>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            model: &str,
            turns: &[Turn],
            _tools: &[ToolSpec],
        ) -> Result<ModelResponse, BackendError> {
            self.requests.lock().unwrap().push(turns.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(BackendError::Request {
                        model: model.to_string(),
                        message: "script exhausted".to_string(),
                    })
                })
        }
    }

    pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolCall::new(id, name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{CacheControl, Content};

    #[test]
    fn test_cache_annotation_maps_to_options() {
        let turn = Turn::user(Content::Block {
            text: "hi".into(),
            cache: Some(CacheControl::Ephemeral),
        });
        assert!(to_message(&turn).options.is_some());
        assert!(to_message(&Turn::user("hi")).options.is_none());
    }

    #[test]
    fn test_non_object_arguments_become_empty() {
        let call = from_genai_call(GenaiToolCall {
            call_id: "c1".into(),
            fn_name: "Bash".into(),
            fn_arguments: Value::String("oops".into()),
        });
        assert!(call.args.is_empty());
        assert_eq!(call.id, "c1");
    }
}
