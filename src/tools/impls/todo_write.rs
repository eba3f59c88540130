//! Todo list tool

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::tools::{names, parse_params, schema, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
    #[serde(rename = "activeForm")]
    pub active_form: String,
}

#[derive(Debug, Deserialize)]
struct TodoWriteParams {
    todos: Vec<TodoItem>,
}

/// Tool holding the agent's structured task list
///
/// Each call replaces the whole list.
#[derive(Default)]
pub struct TodoWriteTool {
    todos: Mutex<Vec<TodoItem>>,
}

impl TodoWriteTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current list
    pub fn todos(&self) -> Vec<TodoItem> {
        self.todos.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

/// A short list carrying completed items is almost always a partial resend
fn partial_list_warning(todos: &[TodoItem]) -> Option<String> {
    let completed = todos.iter().filter(|t| t.status == TodoStatus::Completed).count();
    if completed == 0 || todos.len() >= 3 {
        return None;
    }
    Some(format!(
        "WARNING: Partial todo list detected! You sent only {} items but have {} completed tasks.\n\
         Please resend with the COMPLETE todo list including ALL tasks:\n\
         - All completed tasks (status: completed)\n\
         - Current task (status: in_progress)\n\
         - All pending tasks (status: pending)",
        todos.len(),
        completed
    ))
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &'static str {
        names::TODO_WRITE
    }

    fn description(&self) -> &str {
        "Create and manage a structured task list for the current session. Send the complete \
         list on every call; exactly one task should be in_progress at a time. Mark tasks \
         completed as soon as they are done."
    }

    fn schema(&self) -> Value {
        let item = json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "minLength": 1},
                "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]},
                "activeForm": {"type": "string", "minLength": 1}
            },
            "required": ["content", "status", "activeForm"]
        });
        schema::object_schema()
            .property("todos", schema::array_prop("The updated todo list", item), true)
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: TodoWriteParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if let Some(warning) = partial_list_warning(&params.todos) {
            warn!("Rejected partial todo list ({} items)", params.todos.len());
            return warning;
        }

        debug!("Todo list updated: {} items", params.todos.len());
        match self.todos.lock() {
            Ok(mut todos) => *todos = params.todos,
            Err(e) => return format!("Error updating todos: {}", e),
        }
        "Todos have been modified successfully. Ensure that you continue to use the todo list \
         to track your progress. Please proceed with the current tasks if applicable"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(content: &str, status: &str) -> Value {
        json!({"content": content, "status": status, "activeForm": content})
    }

    #[tokio::test]
    async fn test_full_list_accepted() {
        let tool = TodoWriteTool::new();
        let args = json!({"todos": [
            item("a", "completed"),
            item("b", "in_progress"),
            item("c", "pending"),
        ]});
        let out = tool.invoke(args.as_object().unwrap()).await;
        assert!(out.starts_with("Todos have been modified successfully."));
        assert_eq!(tool.todos().len(), 3);
        assert_eq!(tool.todos()[1].status, TodoStatus::InProgress);
    }

    #[tokio::test]
    async fn test_partial_list_warns_and_keeps_previous() {
        let tool = TodoWriteTool::new();
        let args = json!({"todos": [item("a", "pending")]});
        tool.invoke(args.as_object().unwrap()).await;

        let args = json!({"todos": [item("a", "completed")]});
        let out = tool.invoke(args.as_object().unwrap()).await;
        assert!(out.starts_with(
            "WARNING: Partial todo list detected! You sent only 1 items but have 1 completed tasks."
        ));
        assert_eq!(tool.todos()[0].status, TodoStatus::Pending);
    }
}
