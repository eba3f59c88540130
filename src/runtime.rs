//! Process-wide context shared by every agent
//!
//! Built once at startup and handed around as `Arc<Runtime>`. It owns the
//! background process registry, the cancellation token and the agent
//! registry, and knows how to assemble a tool set by name.

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::config::AgentRuntimeConfig;
use crate::llm::{
    Agent, AgentRegistry, ChatBackend, GenaiBackend, ProviderAdapter, ProviderError,
};
use crate::memory;
use crate::process::{CancellationToken, ProcessRegistry};
use crate::profiles::{ProfileSource, TomlProfileSource};
use crate::prompts;
use crate::tools::{
    names, BashOutputTool, BashTool, EditFileTool, KillBashTool, ListFilesTool, ReadFileTool,
    ShellSettings, TaskTool, TodoWriteTool, Tool, ToolRegistry, WriteFileTool,
};

pub struct Runtime {
    config: AgentRuntimeConfig,
    adapter: Arc<dyn ProviderAdapter>,
    backend: Arc<dyn ChatBackend>,
    processes: Arc<ProcessRegistry>,
    cancel: Arc<CancellationToken>,
    agents: AgentRegistry,
    task_description: OnceLock<String>,
}

impl Runtime {
    /// Assemble a runtime around an explicit backend and profile source
    pub fn new(
        config: AgentRuntimeConfig,
        backend: Arc<dyn ChatBackend>,
        profiles: Box<dyn ProfileSource>,
    ) -> Arc<Self> {
        let adapter = config.provider.adapter();
        let processes = Arc::new(ProcessRegistry::new(
            config.working_dir.clone(),
            config.kill_grace,
        ));
        Arc::new(Self {
            adapter,
            backend,
            processes,
            cancel: Arc::new(CancellationToken::new()),
            agents: AgentRegistry::new(profiles),
            task_description: OnceLock::new(),
            config,
        })
    }

    /// Runtime backed by the live model API and on-disk profiles
    ///
    /// Fails when the provider's credential is missing.
    pub fn live(config: AgentRuntimeConfig) -> Result<Arc<Self>, ProviderError> {
        config.provider.check_credentials()?;
        let backend = Arc::new(GenaiBackend::new(config.max_tokens, config.temperature));
        let profiles = Box::new(TomlProfileSource::new(config.agents_dir.clone()));
        Ok(Self::new(config, backend, profiles))
    }

    pub fn config(&self) -> &AgentRuntimeConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    pub fn processes(&self) -> &Arc<ProcessRegistry> {
        &self.processes
    }

    pub fn cancel(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Task tool description, generated on first use and then fixed
    pub fn task_description(&self) -> &str {
        self.task_description
            .get_or_init(|| self.agents.task_tool_description())
    }

    /// Memory context for this runtime's working directory
    pub fn memory_context(&self) -> Option<String> {
        memory::load_memory_context(&self.config.working_dir)
    }

    fn shell_settings(&self) -> ShellSettings {
        ShellSettings {
            working_dir: self.config.working_dir.clone(),
            default_timeout: self.config.default_timeout,
            max_timeout: self.config.max_timeout,
            kill_grace: self.config.kill_grace,
        }
    }

    /// Build one tool by name
    fn build_tool(self: &Arc<Self>, name: &str) -> Option<Arc<dyn Tool>> {
        let wd = || self.config.working_dir.clone();
        let tool: Arc<dyn Tool> = match name {
            names::READ => Arc::new(ReadFileTool::new(wd())),
            names::WRITE => Arc::new(WriteFileTool::new(wd())),
            names::EDIT => Arc::new(EditFileTool::new(wd())),
            names::LS => Arc::new(ListFilesTool::new(wd())),
            names::BASH => Arc::new(BashTool::new(
                self.processes.clone(),
                self.cancel.clone(),
                self.shell_settings(),
            )),
            names::BASH_OUTPUT => Arc::new(BashOutputTool::new(self.processes.clone())),
            names::KILL_BASH => Arc::new(KillBashTool::new(self.processes.clone())),
            names::TODO_WRITE => Arc::new(TodoWriteTool::new()),
            names::TASK => Arc::new(TaskTool::new(self.clone())),
            other => {
                warn!("No implementation for tool '{}'", other);
                return None;
            },
        };
        Some(tool)
    }

    /// Build a registry holding the named tools
    pub fn build_tools(self: &Arc<Self>, tool_names: &[&str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new(self.config.max_output_chars);
        for name in tool_names {
            if let Some(tool) = self.build_tool(name) {
                registry.register(tool);
            }
        }
        debug!("Built tool set: {:?}", registry.names());
        registry
    }

    /// The top-level interactive agent: every tool, Task included, plus memory
    pub fn main_agent(self: &Arc<Self>) -> Agent {
        let tools = self.build_tools(names::ALL);
        let mut agent = Agent::new(self, prompts::SYSTEM_PROMPT, &self.config.model, tools);
        agent.set_memory_context(self.memory_context());
        agent
    }

    /// Provider label for display, e.g. `Claude (claude-sonnet-4-20250514)`
    pub fn provider_info(&self) -> String {
        format!("{} ({})", self.adapter.name(), self.config.model)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use super::*;
    use crate::llm::testing::ScriptedBackend;
    use crate::profiles::{ProfileRecord, StaticProfileSource};

    /// Runtime over a scripted backend rooted at `working_dir`
    pub fn runtime(
        working_dir: &Path,
        backend: Arc<ScriptedBackend>,
        records: Vec<ProfileRecord>,
    ) -> Arc<Runtime> {
        let config = AgentRuntimeConfig {
            working_dir: working_dir.to_path_buf(),
            agents_dir: None,
            ..AgentRuntimeConfig::default()
        };
        Runtime::new(config, backend, Box::new(StaticProfileSource::new(records)))
    }
}
