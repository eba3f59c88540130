mod background_tasks;
mod edit_file;
mod list_files;
mod read_file;
mod shell;
mod task;
mod todo_write;
mod write_file;

use std::path::{Path, PathBuf};

pub use background_tasks::{BashOutputTool, KillBashTool};
pub use edit_file::EditFileTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use shell::{BashTool, ShellSettings};
pub use task::TaskTool;
pub use todo_write::TodoWriteTool;
pub use write_file::WriteFileTool;

/// Relative paths are taken from the agent's working directory
pub(crate) fn resolve_path(working_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}
