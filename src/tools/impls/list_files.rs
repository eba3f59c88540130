//! Directory listing tool

use std::path::PathBuf;

use async_trait::async_trait;
use fancy_regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::resolve_path;
use crate::tools::{names, parse_params, schema, Tool};

/// Tool for listing a directory
pub struct ListFilesTool {
    working_dir: PathBuf,
}

impl ListFilesTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

#[derive(Debug, Deserialize)]
struct ListFilesParams {
    path: String,
    #[serde(default)]
    ignore: Vec<String>,
}

/// Translate a shell glob (`*`, `?`) into an anchored regex
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c if "\\.+()[]{}^$|".contains(c) => {
                re.push('\\');
                re.push(c);
            },
            c => re.push(c),
        }
    }
    re.push('$');
    match Regex::new(&re) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Ignoring bad ignore pattern '{}': {}", pattern, e);
            None
        },
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        names::LS
    }

    fn description(&self) -> &str {
        "List files and directories in a given path, sorted by name. Directories end with '/'. \
         Optionally pass glob patterns in ignore to skip entries."
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property("path", schema::string_prop("The directory to list"), true)
            .property(
                "ignore",
                schema::array_prop("Glob patterns to ignore", serde_json::json!({"type": "string"})),
                false,
            )
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: ListFilesParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let path = resolve_path(&self.working_dir, &params.path);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_dir() => return format!("Not a directory: {}", params.path),
            Ok(_) => {},
            Err(_) => return format!("Directory not found: {}", params.path),
        }

        let ignore: Vec<Regex> = params.ignore.iter().filter_map(|p| glob_to_regex(p)).collect();
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) => return format!("Error listing directory: {}", e),
        };

        let mut items = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return format!("Error listing directory: {}", e),
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if ignore.iter().any(|re| re.is_match(&name).unwrap_or(false)) {
                continue;
            }
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            items.push(if is_dir { format!("{}/", name) } else { name });
        }
        items.sort();

        if items.is_empty() {
            format!("Empty directory: {}", params.path)
        } else {
            items.join("\n")
        }
    }
}
