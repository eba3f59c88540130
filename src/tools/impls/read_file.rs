//! Read file tool

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::resolve_path;
use crate::tools::{names, parse_params, schema, Tool};

/// Lines returned when no limit is given; also the per-line character cap
const DEFAULT_READ_LIMIT: usize = 2000;

/// Tool for reading file contents with line numbers
pub struct ReadFileTool {
    working_dir: PathBuf,
}

impl ReadFileTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ReadMode {
    #[default]
    TopDown,
    Middle,
    BottomUp,
}

#[derive(Debug, Deserialize)]
struct ReadFileParams {
    file_path: String,
    line_number: Option<usize>,
    limit: Option<usize>,
    #[serde(default)]
    read_mode: ReadMode,
}

/// Zero-based half-open line range to show
fn line_range(total: usize, line_number: Option<usize>, limit: usize, mode: ReadMode) -> (usize, usize) {
    let Some(line_number) = line_number else {
        return (0, limit.min(total));
    };
    let idx = line_number.saturating_sub(1);
    match mode {
        ReadMode::TopDown => {
            let start = idx.min(total);
            (start, (start + limit).min(total))
        },
        ReadMode::Middle => {
            let start = idx.saturating_sub(limit / 2).min(total);
            (start, (start + limit).min(total))
        },
        ReadMode::BottomUp => {
            let end = (idx + 1).min(total);
            (end.saturating_sub(limit), end)
        },
    }
}

/// Format lines like `cat -n`
fn format_lines(content: &str, start: usize, end: usize) -> String {
    content
        .lines()
        .enumerate()
        .skip(start)
        .take(end - start)
        .map(|(i, line)| {
            let line: String = line.chars().take(DEFAULT_READ_LIMIT).collect();
            format!("{:6}\t{}", i + 1, line.trim_end())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        names::READ
    }

    fn description(&self) -> &str {
        "Read a file from the local filesystem. Returns up to 2000 lines in `cat -n` format \
         with line numbers starting at 1. Use line_number with limit and read_mode \
         (top_down, middle, bottom_up) to read a window of a larger file."
    }

    fn schema(&self) -> Value {
        schema::object_schema()
            .property("file_path", schema::string_prop("Path to the file to read"), true)
            .property(
                "line_number",
                schema::integer_prop("The target line number for reading context (1-indexed)"),
                false,
            )
            .property("limit", schema::integer_prop("The number of lines to read"), false)
            .property(
                "read_mode",
                schema::enum_prop(
                    "How to read around line_number",
                    &["top_down", "middle", "bottom_up"],
                ),
                false,
            )
            .build()
    }

    async fn invoke(&self, args: &Map<String, Value>) -> String {
        let params: ReadFileParams = match parse_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let path = resolve_path(&self.working_dir, &params.file_path);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return format!("File not found: {}", params.file_path)
            },
            Err(e) => return format!("Error reading file: {}", e),
        };

        let total = content.lines().count();
        let limit = params.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_READ_LIMIT);
        let (start, end) = line_range(total, params.line_number, limit, params.read_mode);
        format_lines(&content, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_read_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let out = tool.invoke(&args(json!({"file_path": "a.txt"}))).await;
        assert_eq!(out, "     1\tone\n     2\ttwo\n     3\tthree");
    }

    #[tokio::test]
    async fn test_read_window() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=10).map(|i| format!("l{}\n", i)).collect();
        std::fs::write(dir.path().join("b.txt"), body).unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());

        let out = tool
            .invoke(&args(json!({"file_path": "b.txt", "line_number": 5, "limit": 2})))
            .await;
        assert_eq!(out, "     5\tl5\n     6\tl6");

        let out = tool
            .invoke(&args(json!({
                "file_path": "b.txt", "line_number": 5, "limit": 2, "read_mode": "bottom_up"
            })))
            .await;
        assert_eq!(out, "     4\tl4\n     5\tl5");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let out = tool.invoke(&args(json!({"file_path": "nope.txt"}))).await;
        assert_eq!(out, "File not found: nope.txt");
    }

    #[test]
    fn test_line_range_middle() {
        assert_eq!(line_range(100, Some(50), 10, ReadMode::Middle), (44, 54));
        assert_eq!(line_range(5, Some(50), 10, ReadMode::TopDown), (5, 5));
        assert_eq!(line_range(5, None, 10, ReadMode::TopDown), (0, 5));
    }
}
