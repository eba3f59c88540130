//! Agent registry for resolving profiles into runnable agents

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::agent::{Agent, AgentError};
use crate::profiles::{AgentProfile, ProfileSource, ToolSelection};
use crate::prompts;
use crate::runtime::Runtime;
use crate::tools::names;

/// Profile map keyed by agent type
pub type ProfileMap = BTreeMap<String, AgentProfile>;

/// Number of profiles by origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentCounts {
    pub built_in: usize,
    pub user_defined: usize,
    pub total: usize,
}

/// Registry of agent profiles, computed lazily from a source
pub struct AgentRegistry {
    source: Box<dyn ProfileSource>,
    cache: Mutex<Option<Arc<ProfileMap>>>,
}

impl AgentRegistry {
    pub fn new(source: Box<dyn ProfileSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(None),
        }
    }

    /// The profile map, computed on first access
    pub fn profiles(&self) -> Arc<ProfileMap> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(map) = cache.as_ref() {
            return map.clone();
        }
        let map = Arc::new(self.compute());
        *cache = Some(map.clone());
        map
    }

    fn compute(&self) -> ProfileMap {
        let mut map = ProfileMap::new();
        let built_in = AgentProfile::general_purpose();
        map.insert(built_in.name.clone(), built_in);

        for record in self.source.load() {
            let profile = match record.and_then(|r| r.into_profile()) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!("Rejected agent profile: {:#}", e);
                    continue;
                },
            };
            if let Some(previous) = map.get(&profile.name) {
                if previous.is_built_in() {
                    info!("User-defined agent '{}' overrides the built-in", profile.name);
                } else {
                    warn!("Duplicate agent profile '{}', keeping the last one", profile.name);
                }
            }
            map.insert(profile.name.clone(), profile);
        }

        debug!("Loaded {} agent profile(s)", map.len());
        map
    }

    /// Forget the cached map; the next access reloads from the source
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = None;
        debug!("Agent profile cache invalidated");
    }

    pub fn get(&self, agent_type: &str) -> Option<AgentProfile> {
        self.profiles().get(agent_type).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles().keys().cloned().collect()
    }

    pub fn counts(&self) -> AgentCounts {
        let profiles = self.profiles();
        let built_in = profiles.values().filter(|p| p.is_built_in()).count();
        AgentCounts {
            built_in,
            user_defined: profiles.len() - built_in,
            total: profiles.len(),
        }
    }

    /// Concrete tool names for a profile
    ///
    /// Task is never included, so a delegated agent cannot delegate again.
    pub fn resolve_tools(profile: &AgentProfile) -> Vec<&'static str> {
        let requested = match &profile.tools {
            ToolSelection::Wildcard => {
                return names::ALL
                    .iter()
                    .copied()
                    .filter(|name| *name != names::TASK)
                    .collect();
            },
            ToolSelection::Named(list) => list,
        };

        let mut resolved = Vec::new();
        for name in requested {
            if name.starts_with("mcp__") {
                info!("Agent '{}': skipped MCP tool {}", profile.name, name);
            } else if name == names::TASK {
                info!("Agent '{}': skipped Task tool (no nested delegation)", profile.name);
            } else if let Some(known) = names::ALL.iter().find(|n| **n == name.as_str()) {
                if !resolved.contains(known) {
                    resolved.push(*known);
                }
            } else {
                warn!("Agent '{}': unknown tool {}", profile.name, name);
            }
        }

        if resolved.is_empty() {
            debug!("Agent '{}': no usable tools, using defaults", profile.name);
            return names::SUBAGENT_DEFAULT.to_vec();
        }
        resolved
    }

    /// Build a fresh agent for a profile
    pub fn load_agent(&self, runtime: &Arc<Runtime>, agent_type: &str) -> Result<Agent, AgentError> {
        let profile = self.get(agent_type).ok_or_else(|| AgentError::UnknownProfile {
            requested: agent_type.to_string(),
            available: self.names(),
        })?;

        let tools = runtime.build_tools(&Self::resolve_tools(&profile));
        let model = profile
            .model
            .clone()
            .unwrap_or_else(|| runtime.config().model.clone());
        info!(
            "Loading agent '{}' with model {} and tools {:?}",
            profile.name,
            model,
            tools.names()
        );
        Ok(Agent::new(runtime, &profile.instructions, &model, tools))
    }

    /// Description for the Task tool, listing every profile
    pub fn task_tool_description(&self) -> String {
        let lines: Vec<String> = self
            .profiles()
            .values()
            .map(|profile| {
                let tools = match &profile.tools {
                    ToolSelection::Wildcard => "*".to_string(),
                    ToolSelection::Named(list) => list.join(", "),
                };
                format!("- {}: {} (Tools: {})", profile.name, profile.usage, tools)
            })
            .collect();
        format!(
            "{}\n{}\n\n{}",
            prompts::TASK_DESCRIPTION_HEADER,
            lines.join("\n"),
            prompts::TASK_DESCRIPTION_FOOTER
        )
    }
}
