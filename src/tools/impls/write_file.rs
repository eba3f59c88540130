//! Write file tool

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::resolve_path;
use crate::tools::{names, parse_params, schema, Tool};

/// Tool for creating or overwriting files
pub struct WriteFileTool {
    working_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

#[derive(Debug, Deserialize)]
struct WriteFileParams {
    file_path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        names::WRITE
    }

    fn description(&self) -> &str {
        "Write a file to the local filesystem, overwriting it if it exists. \
         Parent directories are created as needed. Prefer Edit for changes to existing files."
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property("file_path", schema::string_prop("Path to the file to write"), true)
            .property("content", schema::string_prop("The content to write to the file"), true)
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: WriteFileParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let path = resolve_path(&self.working_dir, &params.file_path);

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return format!("Error writing file: {}", e);
            }
        }
        match tokio::fs::write(&path, &params.content).await {
            Ok(()) => {
                debug!("Wrote {} bytes to {}", params.content.len(), path.display());
                format!("Successfully wrote to {}", params.file_path)
            },
            Err(e) => format!("Error writing file: {}", e),
        }
    }
}
