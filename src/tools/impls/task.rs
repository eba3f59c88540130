//! Task tool for delegating work to a sub-agent

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::llm::delegate;
use crate::runtime::Runtime;
use crate::tools::{names, parse_params, schema, Tool};

/// Tool for running a prompt on a fresh agent of a chosen profile
pub struct TaskTool {
    runtime: Arc<Runtime>,
}

impl TaskTool {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }
}

#[derive(Debug, Deserialize)]
struct TaskParams {
    description: String,
    prompt: String,
    subagent_type: String,
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &'static str {
        names::TASK
    }

    fn description(&self) -> &str {
        self.runtime.task_description()
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property(
                "description",
                schema::string_prop("A short (3-5 word) description of the task"),
                true,
            )
            .property("prompt", schema::string_prop("The task for the agent to perform"), true)
            .property(
                "subagent_type",
                schema::string_prop("The type of specialized agent to use for this task"),
                true,
            )
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: TaskParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        delegate(
            &self.runtime,
            &params.description,
            &params.prompt,
            &params.subagent_type,
        )
        .await
    }
}
