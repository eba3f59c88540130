//! Slash commands for the REPL

use std::sync::Arc;

use anyhow::Result;
use shepherd::{Agent, Runtime};

/// Available slash commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Reset,
    Agents,
    ReloadAgents,
    Processes,
    Usage,
    Quit,
}

/// What the REPL should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Print(String),
    Quit,
}

const HELP: &str = "\
/help           Show this help
/reset          Clear the conversation (memory context is kept)
/agents         List agent profiles
/reload-agents  Re-read agent profiles from disk
/processes      List background shells
/usage          Show token usage for this session
/quit           Exit";

/// Parse input text and return command if it starts with /
pub fn parse_command(input: &str) -> Result<Command> {
    let input = input.trim();

    let Some(rest) = input.strip_prefix('/') else {
        anyhow::bail!("Not a command");
    };

    let cmd_name = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty command"))?;

    match cmd_name {
        "help" => Ok(Command::Help),
        "reset" | "clear" => Ok(Command::Reset),
        "agents" => Ok(Command::Agents),
        "reload-agents" => Ok(Command::ReloadAgents),
        "processes" | "ps" => Ok(Command::Processes),
        "usage" => Ok(Command::Usage),
        "quit" | "exit" => Ok(Command::Quit),
        unknown => anyhow::bail!("Unknown command: /{}", unknown),
    }
}

impl Command {
    /// Execute the command against the runtime and the main agent
    pub async fn execute(&self, runtime: &Arc<Runtime>, agent: &mut Agent) -> Outcome {
        match self {
            Command::Help => Outcome::Print(HELP.to_string()),
            Command::Reset => {
                agent.reset();
                Outcome::Print("Conversation cleared.".to_string())
            },
            Command::Agents => Outcome::Print(list_agents(runtime)),
            Command::ReloadAgents => {
                runtime.agents().invalidate();
                let counts = runtime.agents().counts();
                Outcome::Print(format!(
                    "Reloaded {} agent(s). The Task tool description keeps the startup list until restart.",
                    counts.total
                ))
            },
            Command::Processes => Outcome::Print(list_processes(runtime).await),
            Command::Usage => {
                let usage = agent.total_usage();
                Outcome::Print(format!(
                    "{}\nSession totals - Input: {} Output: {} Cache read: {} Cache write: {}",
                    runtime.adapter().format_usage(&usage),
                    usage.input_tokens,
                    usage.output_tokens,
                    usage.cache_read_tokens,
                    usage.cache_creation_tokens
                ))
            },
            Command::Quit => Outcome::Quit,
        }
    }
}

fn list_agents(runtime: &Runtime) -> String {
    let counts = runtime.agents().counts();
    let mut lines = vec![format!(
        "{} agent(s): {} built-in, {} user-defined",
        counts.total, counts.built_in, counts.user_defined
    )];
    for profile in runtime.agents().profiles().values() {
        let origin = if profile.is_built_in() { "built-in" } else { "user" };
        lines.push(format!("  {} [{}]: {}", profile.name, origin, profile.usage));
    }
    lines.join("\n")
}

async fn list_processes(runtime: &Runtime) -> String {
    let processes = runtime.processes().list().await;
    if processes.is_empty() {
        return "No background shells.".to_string();
    }
    processes
        .iter()
        .map(|p| {
            format!(
                "{} ({}) pid={} started {} ({} ago): {}",
                p.id,
                p.status,
                p.pid.map(|pid| pid.to_string()).unwrap_or_else(|| "-".to_string()),
                p.started_at.format("%H:%M:%S"),
                format_age(p.runtime.as_secs()),
                p.command
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_age(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m{}s", s / 60, s % 60),
        s => format!("{}h{}m", s / 3600, (s % 3600) / 60),
    }
}
