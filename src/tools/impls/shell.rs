//! Shell command execution tool

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::process::{shell, CancellationToken, ProcessRegistry};
use crate::tools::{names, parse_params, schema, Tool};

/// Timeouts and location for shell commands
#[derive(Debug, Clone)]
pub struct ShellSettings {
    pub working_dir: PathBuf,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub kill_grace: Duration,
}

impl ShellSettings {
    /// Requested timeout in ms, clamped to the maximum
    fn timeout(&self, requested_ms: Option<u64>) -> Duration {
        match requested_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms).min(self.max_timeout),
            _ => self.default_timeout,
        }
    }
}

/// Tool for running shell commands in the foreground or background
pub struct BashTool {
    processes: Arc<ProcessRegistry>,
    cancel: Arc<CancellationToken>,
    settings: ShellSettings,
}

impl BashTool {
    pub fn new(
        processes: Arc<ProcessRegistry>,
        cancel: Arc<CancellationToken>,
        settings: ShellSettings,
    ) -> Self {
        Self {
            processes,
            cancel,
            settings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BashParams {
    command: String,
    timeout: Option<u64>,
    #[serde(default)]
    run_in_background: bool,
    description: Option<String>,
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &'static str {
        names::BASH
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. \
         Commands time out after 120000ms (2 minutes) unless a timeout is given (max 600000ms). \
         Output longer than 30000 characters is truncated. \
         Set run_in_background to start a long-running command and monitor it with BashOutput; \
         stop it with KillBash."
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property("command", schema::string_prop("The command to execute"), true)
            .property(
                "timeout",
                schema::integer_prop("Optional timeout in milliseconds (max 600000)"),
                false,
            )
            .property(
                "run_in_background",
                schema::boolean_prop("Run the command in the background and return a shell ID"),
                false,
            )
            .property(
                "description",
                schema::string_prop("Clear, concise description of what this command does in 5-10 words"),
                false,
            )
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: BashParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if let Some(ref description) = params.description {
            info!("Bash: {}", description);
        }

        if params.run_in_background {
            return match self.processes.spawn(&params.command).await {
                Ok(id) => format!(
                    "Background shell started with ID: {id}\nCommand: {}\nUse BashOutput tool with bash_id='{id}' to monitor output.",
                    params.command
                ),
                Err(e) => format!("Error executing command: {:#}", e),
            };
        }

        shell::run(
            &params.command,
            &self.settings.working_dir,
            self.settings.timeout(params.timeout),
            self.settings.kill_grace,
            &self.cancel,
        )
        .await
        .render()
    }
}
