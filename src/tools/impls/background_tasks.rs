//! Tools for monitoring and stopping background shells

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::process::ProcessRegistry;
use crate::tools::{names, parse_params, schema, Tool};

/// Tool for reading new output from a background shell
pub struct BashOutputTool {
    processes: Arc<ProcessRegistry>,
}

impl BashOutputTool {
    pub fn new(processes: Arc<ProcessRegistry>) -> Self {
        Self { processes }
    }
}

#[derive(Debug, Deserialize)]
struct BashOutputParams {
    bash_id: String,
    filter: Option<String>,
}

#[async_trait]
impl Tool for BashOutputTool {
    fn name(&self) -> &'static str {
        names::BASH_OUTPUT
    }

    fn description(&self) -> &str {
        "Retrieve output from a running or completed background shell. \
         Always returns only new output since the last check, along with the shell status. \
         An optional regex filter keeps only matching lines; lines that do not match are \
         discarded and will not be returned later."
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property(
                "bash_id",
                schema::string_prop("The ID of the background shell to retrieve output from"),
                true,
            )
            .property(
                "filter",
                schema::string_prop("Optional regular expression to filter the output lines"),
                false,
            )
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: BashOutputParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        self.processes
            .poll(&params.bash_id, params.filter.as_deref())
            .await
            .render()
    }
}

/// Tool for terminating a background shell
pub struct KillBashTool {
    processes: Arc<ProcessRegistry>,
}

impl KillBashTool {
    pub fn new(processes: Arc<ProcessRegistry>) -> Self {
        Self { processes }
    }
}

#[derive(Debug, Deserialize)]
struct KillBashParams {
    shell_id: String,
}

#[async_trait]
impl Tool for KillBashTool {
    fn name(&self) -> &'static str {
        names::KILL_BASH
    }

    fn description(&self) -> &str {
        "Kill a running background shell by its ID. The shell is terminated and forgotten; \
         read any output you need with BashOutput first."
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property(
                "shell_id",
                schema::string_prop("The ID of the background shell to kill"),
                true,
            )
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: KillBashParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        self.processes.kill(&params.shell_id).await.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_output_and_kill_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let processes = Arc::new(ProcessRegistry::new(dir.path().to_path_buf(), Duration::from_millis(100)));
        let output = BashOutputTool::new(processes.clone());
        let kill = KillBashTool::new(processes);

        assert_eq!(
            output.invoke(&args(json!({"bash_id": "nope"}))).await,
            "No shell found with ID: nope"
        );
        assert_eq!(
            kill.invoke(&args(json!({"shell_id": "nope"}))).await,
            "No shell found with ID: nope"
        );
    }

    #[tokio::test]
    async fn test_kill_running_shell() {
        let dir = tempfile::tempdir().unwrap();
        let processes = Arc::new(ProcessRegistry::new(dir.path().to_path_buf(), Duration::from_millis(100)));
        let id = processes.spawn("sleep 30").await.unwrap();

        let kill = KillBashTool::new(processes.clone());
        assert_eq!(
            kill.invoke(&args(json!({ "shell_id": id }))).await,
            format!("Shell {} has been terminated", id)
        );
        let output = BashOutputTool::new(processes);
        assert_eq!(
            output.invoke(&args(json!({ "bash_id": id }))).await,
            format!("No shell found with ID: {}", id)
        );
    }

    #[tokio::test]
    async fn test_missing_bash_id() {
        let dir = tempfile::tempdir().unwrap();
        let processes = Arc::new(ProcessRegistry::new(dir.path().to_path_buf(), Duration::from_millis(100)));
        let out = BashOutputTool::new(processes).invoke(&Map::new()).await;
        assert!(out.starts_with("Invalid params: "));
    }
}
