//! Memory context: user and project instruction files
//!
//! Both files are optional. When at least one exists their contents are
//! wrapped in a `<system-reminder>` block and sent as the memory turn.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{config_dir, MEMORY_FILE};

/// Locations of the instruction files for one working directory
#[derive(Debug, Clone)]
pub struct MemoryFiles {
    pub global: Option<PathBuf>,
    pub project: PathBuf,
}

impl MemoryFiles {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            global: config_dir().map(|dir| dir.join(MEMORY_FILE)),
            project: working_dir.join(MEMORY_FILE),
        }
    }

    /// Build the memory context, or None when neither file has instructions
    pub fn load(&self) -> Option<String> {
        let global = self.global.as_deref().and_then(read_instructions);
        let project = read_instructions(&self.project);
        if global.is_none() && project.is_none() {
            return None;
        }

        let mut parts = vec![
            "<system-reminder>".to_string(),
            "As you answer the user's questions, you can use the following context:".to_string(),
            "# shepherdMd".to_string(),
            "Codebase and user instructions are shown below. Be sure to adhere to these \
             instructions. IMPORTANT: These instructions OVERRIDE any default behavior and you \
             MUST follow them exactly as written."
                .to_string(),
            String::new(),
        ];

        if let (Some(path), Some(content)) = (&self.global, global) {
            parts.push(format!(
                "Contents of {} (user's private global instructions for all projects):",
                path.display()
            ));
            parts.push(String::new());
            parts.push(content);
            parts.push(String::new());
        }
        if let Some(content) = project {
            let path = self.project.canonicalize().unwrap_or_else(|_| self.project.clone());
            parts.push(format!(
                "Contents of {} (project instructions, checked into the codebase):",
                path.display()
            ));
            parts.push(String::new());
            parts.push(content);
            parts.push(String::new());
        }

        parts.push(
            "IMPORTANT: this context may or may not be relevant to your tasks. You should not \
             respond to this context unless it is highly relevant to your task."
                .to_string(),
        );
        parts.push("</system-reminder>".to_string());
        Some(parts.join("\n"))
    }
}

fn read_instructions(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => {
            debug!("Skipping empty memory file {}", path.display());
            None
        },
        Ok(content) => {
            debug!("Loaded memory file {}", path.display());
            Some(content.trim().to_string())
        },
        Err(e) => {
            warn!("Could not load {}: {}", path.display(), e);
            None
        },
    }
}

/// Memory context for a working directory
pub fn load_memory_context(working_dir: &Path) -> Option<String> {
    MemoryFiles::new(working_dir).load()
}
