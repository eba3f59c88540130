//! Edit file tool with exact string replacement

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::resolve_path;
use crate::tools::{names, parse_params, schema, Tool};

/// Tool for editing existing files with search/replace
pub struct EditFileTool {
    working_dir: PathBuf,
}

impl EditFileTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

#[derive(Debug, Deserialize)]
struct EditFileParams {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

/// Apply one replacement, returning the new content and the count replaced
fn apply_edit(content: &str, params: &EditFileParams) -> Result<(String, usize), String> {
    if params.old_string.is_empty() {
        return Err("Error: old_string cannot be empty".to_string());
    }
    if params.old_string == params.new_string {
        return Err("Error: old_string and new_string cannot be the same".to_string());
    }
    let count = content.matches(&params.old_string).count();
    if count == 0 {
        return Err(format!("Error: String not found in file: {:?}", params.old_string));
    }
    if !params.replace_all && count > 1 {
        return Err(format!(
            "Error: String appears {} times in file. Use replace_all=true or provide more context to make it unique",
            count
        ));
    }
    if params.replace_all {
        Ok((content.replace(&params.old_string, &params.new_string), count))
    } else {
        Ok((content.replacen(&params.old_string, &params.new_string, 1), 1))
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        names::EDIT
    }

    fn description(&self) -> &str {
        "Perform an exact string replacement in a file. old_string must appear exactly once \
         unless replace_all is set. Read the file first and preserve indentation exactly."
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property("file_path", schema::string_prop("Path to the file to modify"), true)
            .property("old_string", schema::string_prop("The text to replace"), true)
            .property(
                "new_string",
                schema::string_prop("The text to replace it with (must differ from old_string)"),
                true,
            )
            .property(
                "replace_all",
                schema::boolean_prop("Replace all occurrences of old_string (default false)"),
                false,
            )
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: EditFileParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let path = resolve_path(&self.working_dir, &params.file_path);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return format!("Error: File not found: {}", params.file_path)
            },
            Err(e) => return format!("Error editing file: {}", e),
        };

        let (updated, count) = match apply_edit(&content, &params) {
            Ok(result) => result,
            Err(e) => return e,
        };
        if let Err(e) = tokio::fs::write(&path, updated).await {
            return format!("Error editing file: {}", e);
        }

        if count > 1 {
            format!("Replaced {} occurrence(s) in {}", count, params.file_path)
        } else {
            format!("Replaced in {}", params.file_path)
        }
    }
}
