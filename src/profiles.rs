//! Agent profiles and where they come from
//!
//! A profile names a bundle of instructions, permitted tools and an optional
//! model. The built-in `general-purpose` profile always exists; more come
//! from a [`ProfileSource`], by default `*.toml` files in the agents
//! directory:
//!
//! ```toml
//! name = "reviewer"
//! usage = "Reviews a diff for correctness"
//! tools = ["Read", "Bash"]   # or tools = "*"
//! model = "claude-sonnet-4-20250514"
//! instructions = """
//! You review code...
//! """
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::prompts;
use crate::tools::names;

/// Name of the profile that always exists
pub const GENERAL_PURPOSE: &str = "general-purpose";

/// Where a profile was defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileOrigin {
    BuiltIn,
    UserDefined,
}

/// Tools a profile may use
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawToolSelection")]
pub enum ToolSelection {
    /// Every tool except Task
    #[default]
    Wildcard,
    Named(Vec<String>),
}

/// `"*"`, `"Read, Bash"` or `["Read", "Bash"]`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawToolSelection {
    Text(String),
    List(Vec<String>),
}

impl From<RawToolSelection> for ToolSelection {
    fn from(raw: RawToolSelection) -> Self {
        let list: Vec<String> = match raw {
            RawToolSelection::Text(text) => text.split(',').map(|s| s.to_string()).collect(),
            RawToolSelection::List(list) => list,
        };
        let list: Vec<String> = list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if list.iter().any(|s| s == "*") {
            Self::Wildcard
        } else {
            Self::Named(list)
        }
    }
}

impl ToolSelection {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    /// When the parent model should pick this agent
    pub usage: String,
    pub tools: ToolSelection,
    /// None inherits the runtime model
    pub model: Option<String>,
    pub origin: ProfileOrigin,
    pub instructions: String,
}

impl AgentProfile {
    /// The profile that is always available
    pub fn general_purpose() -> Self {
        Self {
            name: GENERAL_PURPOSE.to_string(),
            usage: prompts::GENERAL_PURPOSE_USAGE.to_string(),
            tools: ToolSelection::Named(
                [
                    names::READ,
                    names::WRITE,
                    names::EDIT,
                    names::BASH,
                    names::LS,
                    "Glob",
                    "Grep",
                    names::BASH_OUTPUT,
                    names::TODO_WRITE,
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ),
            model: None,
            origin: ProfileOrigin::BuiltIn,
            instructions: prompts::GENERAL_PURPOSE_PROMPT.to_string(),
        }
    }

    pub fn is_built_in(&self) -> bool {
        self.origin == ProfileOrigin::BuiltIn
    }
}

/// Raw profile as read from a source, before validation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub name: String,
    pub usage: String,
    pub tools: ToolSelection,
    pub model: Option<String>,
    pub instructions: String,
}

impl ProfileRecord {
    /// Validate into a user-defined profile
    pub fn into_profile(self) -> Result<AgentProfile> {
        if self.name.trim().is_empty() {
            bail!("missing 'name'");
        }
        if self.usage.trim().is_empty() {
            bail!("profile '{}' is missing 'usage'", self.name);
        }
        Ok(AgentProfile {
            name: self.name.trim().to_string(),
            usage: self.usage.trim().to_string(),
            tools: self.tools,
            model: self.model.filter(|m| !m.trim().is_empty()),
            origin: ProfileOrigin::UserDefined,
            instructions: self.instructions,
        })
    }
}

/// Supplier of user-defined profile records
pub trait ProfileSource: Send + Sync {
    /// Every record found, each parsed independently
    fn load(&self) -> Vec<Result<ProfileRecord>>;
}

/// Reads `*.toml` records from one directory
pub struct TomlProfileSource {
    dir: Option<PathBuf>,
}

impl TomlProfileSource {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    fn read_record(path: &Path) -> Result<ProfileRecord> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agent profile: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse agent profile: {}", path.display()))
    }
}

impl ProfileSource for TomlProfileSource {
    fn load(&self) -> Vec<Result<ProfileRecord>> {
        let Some(dir) = &self.dir else {
            return Vec::new();
        };
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No agent profiles in {}: {}", dir.display(), e);
                return Vec::new();
            },
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        paths
            .iter()
            .map(|path| {
                let record = Self::read_record(path);
                if let Err(ref e) = record {
                    warn!("{:#}", e);
                }
                record
            })
            .collect()
    }
}

/// Fixed set of records, for embedding and tests
#[derive(Default)]
pub struct StaticProfileSource {
    records: Vec<ProfileRecord>,
}

impl StaticProfileSource {
    pub fn new(records: Vec<ProfileRecord>) -> Self {
        Self { records }
    }
}

impl ProfileSource for StaticProfileSource {
    fn load(&self) -> Vec<Result<ProfileRecord>> {
        self.records.iter().cloned().map(Ok).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_toml_source_reads_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("reviewer.toml"),
            "name = \"reviewer\"\nusage = \"Reviews code\"\ntools = [\"Read\", \"Bash\"]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("scout.toml"),
            "name = \"scout\"\nusage = \"Explores\"\ntools = \"*\"\ninstructions = \"Look around.\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = TomlProfileSource::new(Some(dir.path().to_path_buf()));
        let records: Vec<ProfileRecord> = source.load().into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "reviewer");
        assert_eq!(
            records[0].tools,
            ToolSelection::Named(vec!["Read".into(), "Bash".into()])
        );
        assert!(records[1].tools.is_wildcard());
        assert_eq!(records[1].instructions, "Look around.");
    }

    #[test]
    fn test_bad_file_rejected_individually() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), "name = [").unwrap();
        std::fs::write(dir.path().join("b.toml"), "name = \"b\"\nusage = \"u\"\n").unwrap();

        let results = TomlProfileSource::new(Some(dir.path().to_path_buf())).load();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_comma_separated_tools() {
        let record: ProfileRecord =
            toml::from_str("name = \"a\"\nusage = \"b\"\ntools = \"Read, Bash ,\"\n").unwrap();
        assert_eq!(
            record.tools,
            ToolSelection::Named(vec!["Read".into(), "Bash".into()])
        );
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let source = TomlProfileSource::new(Some(PathBuf::from("/nonexistent/shepherd/agents")));
        assert!(source.load().is_empty());
        assert!(TomlProfileSource::new(None).load().is_empty());
    }

    #[test]
    fn test_record_validation() {
        let missing_usage = ProfileRecord {
            name: "x".into(),
            ..Default::default()
        };
        assert!(missing_usage.into_profile().is_err());
        assert!(ProfileRecord::default().into_profile().is_err());

        let ok = ProfileRecord {
            name: " x ".into(),
            usage: "does x".into(),
            model: Some("".into()),
            ..Default::default()
        }
        .into_profile()
        .unwrap();
        assert_eq!(ok.name, "x");
        assert_eq!(ok.model, None);
        assert_eq!(ok.origin, ProfileOrigin::UserDefined);
        assert!(ok.tools.is_wildcard());
    }
}
