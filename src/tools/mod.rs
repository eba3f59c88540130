//! Tool definitions and dispatch
//!
//! A tool is a named capability the model can invoke with a JSON argument
//! map. Every tool returns plain text; failures are reported in that text so
//! the loop can keep going.

pub mod impls;
mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub use crate::conversation::ToolCall;
pub use impls::{
    BashOutputTool, BashTool, EditFileTool, KillBashTool, ListFilesTool, ReadFileTool,
    ShellSettings, TaskTool, TodoWriteTool, WriteFileTool,
};

/// Default cap on tool result length, in characters
pub const MAX_OUTPUT_CHARS: usize = 30_000;

const TRUNCATION_MARKER: &str = "\n[Output truncated...]";

/// Tool names exposed to the model
pub mod names {
    pub const READ: &str = "Read";
    pub const WRITE: &str = "Write";
    pub const EDIT: &str = "Edit";
    pub const LS: &str = "LS";
    pub const BASH: &str = "Bash";
    pub const BASH_OUTPUT: &str = "BashOutput";
    pub const KILL_BASH: &str = "KillBash";
    pub const TODO_WRITE: &str = "TodoWrite";
    pub const TASK: &str = "Task";

    /// Every tool this crate implements
    pub const ALL: &[&str] = &[
        READ,
        WRITE,
        EDIT,
        LS,
        BASH,
        BASH_OUTPUT,
        KILL_BASH,
        TODO_WRITE,
        TASK,
    ];

    /// Tools handed to a sub-agent whose profile resolves to nothing
    pub const SUBAGENT_DEFAULT: &[&str] = &[READ, WRITE, EDIT, BASH, LS, BASH_OUTPUT, TODO_WRITE];

    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Model-facing description of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// Text result correlated with the call that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;

    /// Execute with the model-supplied arguments
    async fn invoke(&self, args: &Map<String, Value>) -> String;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            schema: self.schema(),
        }
    }
}

/// Deserialize tool arguments, producing the model-facing error text on failure
pub fn parse_params<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T, String> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| format!("Invalid params: {}", e))
}

/// Cap text at `cap` characters, marker included
///
/// Applying it twice gives the same result as applying it once.
pub fn truncate_output(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if cap <= marker_len {
        return text.chars().take(cap).collect();
    }
    let mut out: String = text.chars().take(cap - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Registry of available tools for one agent
#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
    max_output_chars: usize,
}

impl ToolRegistry {
    pub fn new(max_output_chars: usize) -> Self {
        Self {
            tools: BTreeMap::new(),
            max_output_chars,
        }
    }

    pub fn empty() -> Self {
        Self::new(MAX_OUTPUT_CHARS)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn max_output_chars(&self) -> usize {
        self.max_output_chars
    }

    /// Specs in stable name order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Resolve and run one call; unknown names yield a synthetic result
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let content = match self.get(&call.name) {
            Some(tool) => {
                debug!("Dispatching {} (call_id={})", call.name, call.id);
                tool.invoke(&call.args).await
            },
            None => {
                warn!("Model requested unknown tool: {}", call.name);
                format!("Unknown tool: {}", call.name)
            },
        };
        ToolResult {
            call_id: call.id.clone(),
            content: truncate_output(&content, self.max_output_chars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "Echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn schema(&self) -> Value {
            schema::object_schema()
                .property("text", schema::string_prop("Text to echo"), true)
                .build()
        }

        async fn invoke(&self, args: &Map<String, Value>) -> String {
            args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string()
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_known_tool() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(EchoTool));
        let result = registry
            .dispatch(&ToolCall::new("c1", "Echo", args(json!({"text": "hi"}))))
            .await;
        assert_eq!(
            result,
            ToolResult {
                call_id: "c1".into(),
                content: "hi".into()
            }
        );
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = ToolRegistry::empty();
        let result = registry.dispatch(&ToolCall::new("c9", "Foo", Map::new())).await;
        assert_eq!(result.call_id, "c9");
        assert_eq!(result.content, "Unknown tool: Foo");
    }

    #[tokio::test]
    async fn test_dispatch_truncates() {
        let mut registry = ToolRegistry::new(50);
        registry.register(Arc::new(EchoTool));
        let long = "x".repeat(500);
        let result = registry
            .dispatch(&ToolCall::new("c1", "Echo", args(json!({ "text": long }))))
            .await;
        assert_eq!(result.content.chars().count(), 50);
        assert!(result.content.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_idempotent() {
        let text = "héllo wörld ".repeat(10_000);
        let once = truncate_output(&text, MAX_OUTPUT_CHARS);
        let twice = truncate_output(&once, MAX_OUTPUT_CHARS);
        assert_eq!(once, twice);
        assert_eq!(once.chars().count(), MAX_OUTPUT_CHARS);
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_output("short", 10), "short");
        assert_eq!(truncate_output("abcdef", 3), "abc");
    }

    #[test]
    fn test_parse_params_error_text() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Params {
            path: String,
        }
        let err = parse_params::<Params>(&Map::new()).unwrap_err();
        assert!(err.starts_with("Invalid params: "));
    }

    #[test]
    fn test_specs_sorted() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(EchoTool));
        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "Echo");
        assert_eq!(specs[0].schema["required"], json!(["text"]));
    }

    #[test]
    fn test_task_not_in_subagent_default() {
        assert!(!names::SUBAGENT_DEFAULT.contains(&names::TASK));
        assert!(names::SUBAGENT_DEFAULT.iter().all(|n| names::is_known(n)));
    }
}
