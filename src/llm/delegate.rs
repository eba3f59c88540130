//! One-shot delegation to a sub-agent

use std::sync::Arc;

use tracing::{error, info};

use crate::profiles::GENERAL_PURPOSE;
use crate::runtime::Runtime;

/// Run `prompt` on a fresh agent of `agent_type` and report the outcome as text
///
/// The agent lives for exactly one request and is dropped afterwards.
pub async fn delegate(runtime: &Arc<Runtime>, label: &str, prompt: &str, agent_type: &str) -> String {
    info!("Delegating '{}' to {} agent", label, agent_type);

    let result = match runtime.agents().load_agent(runtime, agent_type) {
        Ok(mut agent) => {
            if agent_type == GENERAL_PURPOSE {
                agent.set_memory_context(runtime.memory_context());
            }
            agent.chat(prompt).await
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => format!("Task completed: {}\n\nAgent Response:\n{}", label, response),
        Err(e) => {
            error!("Delegated task '{}' failed: {}", label, e);
            format!(
                "Error executing task '{}' with {} agent: {}\nAvailable agents: {:?}",
                label,
                agent_type,
                e,
                runtime.agents().names()
            )
        },
    }
}
