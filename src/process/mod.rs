//! Background process management
//!
//! Tracks detached shell commands started by the Bash tool. Output from
//! stdout and stderr is drained line-wise into one append-only buffer per
//! process; each poll returns only what arrived since the previous poll.

pub mod cancel;
pub mod shell;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use fancy_regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use cancel::CancellationToken;
pub use shell::RunOutcome;

pub type ProcessId = String;

/// Length of a generated process id
const ID_LEN: usize = 8;

/// Status of a tracked process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Completed { exit_code: i32 },
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Completed { .. } => f.write_str("completed"),
        }
    }
}

/// Snapshot of a tracked process for listings
#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub id: ProcessId,
    pub command: String,
    pub pid: Option<u32>,
    pub status: ProcessStatus,
    pub started_at: DateTime<Local>,
    pub runtime: Duration,
}

/// Result of polling a process for new output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    NotFound { id: String },
    Output {
        id: String,
        status: ProcessStatus,
        text: String,
    },
    NoNewOutput { id: String, status: ProcessStatus },
    InvalidFilter { id: String, error: String },
}

impl PollOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::NotFound { id } => format!("No shell found with ID: {}", id),
            Self::Output { id, status, text } => format!("Shell {} ({}):\n{}", id, status, text),
            Self::NoNewOutput { id, status } => {
                format!("Shell {} ({}):\n(no new output)", id, status)
            },
            Self::InvalidFilter { error, .. } => format!("Invalid regex filter: {}", error),
        }
    }
}

/// Result of killing a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    NotFound { id: String },
    Terminated { id: String },
}

impl KillOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::NotFound { id } => format!("No shell found with ID: {}", id),
            Self::Terminated { id } => format!("Shell {} has been terminated", id),
        }
    }
}

struct ProcessEntry {
    command: String,
    pid: Option<u32>,
    started_at: DateTime<Local>,
    started: Instant,
    status: ProcessStatus,
    child: Child,
    output: Arc<Mutex<String>>,
    /// Byte offset of output already delivered
    cursor: usize,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessEntry {
    /// Completed only once the process exited and both pipes are drained
    fn refresh(&mut self) {
        if self.status != ProcessStatus::Running {
            return;
        }
        if !self.readers.iter().all(|h| h.is_finished()) {
            return;
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            self.status = ProcessStatus::Completed {
                exit_code: status.code().unwrap_or(-1),
            };
            debug!(pid = ?self.pid, status = ?self.status, "Background process completed");
        }
    }

    fn summary(&self, id: &str) -> ProcessSummary {
        ProcessSummary {
            id: id.to_string(),
            command: self.command.clone(),
            pid: self.pid,
            status: self.status,
            started_at: self.started_at,
            runtime: self.started.elapsed(),
        }
    }
}

/// Registry of background processes
pub struct ProcessRegistry {
    processes: Mutex<HashMap<ProcessId, ProcessEntry>>,
    working_dir: PathBuf,
    kill_grace: Duration,
}

impl ProcessRegistry {
    pub fn new(working_dir: PathBuf, kill_grace: Duration) -> Self {
        Self {
            processes: Mutex::new(HashMap::new()),
            working_dir,
            kill_grace,
        }
    }

    /// Start a detached command and return its id
    pub async fn spawn(&self, command: &str) -> Result<ProcessId> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // New process group so kill reaches every child
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn background command: {}", command))?;
        let pid = child.id();

        let output = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(capture_lines(stdout, output.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(capture_lines(stderr, output.clone())));
        }

        let mut processes = self.processes.lock().await;
        let id = loop {
            let candidate = new_id();
            if !processes.contains_key(&candidate) {
                break candidate;
            }
        };
        processes.insert(
            id.clone(),
            ProcessEntry {
                command: command.to_string(),
                pid,
                started_at: Local::now(),
                started: Instant::now(),
                status: ProcessStatus::Running,
                child,
                output,
                cursor: 0,
                readers,
            },
        );

        info!(id = %id, pid = ?pid, command = %command, "Process spawned");
        Ok(id)
    }

    /// Return output produced since the previous poll, optionally filtered
    ///
    /// Filtered-out lines are consumed all the same. An invalid pattern
    /// leaves the cursor untouched.
    pub async fn poll(&self, id: &str, filter: Option<&str>) -> PollOutcome {
        let mut processes = self.processes.lock().await;
        let Some(entry) = processes.get_mut(id) else {
            return PollOutcome::NotFound { id: id.to_string() };
        };

        let regex = match filter.filter(|f| !f.is_empty()).map(Regex::new).transpose() {
            Ok(regex) => regex,
            Err(e) => {
                return PollOutcome::InvalidFilter {
                    id: id.to_string(),
                    error: e.to_string(),
                }
            },
        };

        entry.refresh();
        let delta = {
            let buffer = entry.output.lock().await;
            let delta = buffer[entry.cursor..].to_string();
            entry.cursor = buffer.len();
            delta
        };

        let text = match regex {
            Some(regex) => delta
                .lines()
                .filter(|line| regex.is_match(line).unwrap_or(false))
                .collect::<Vec<_>>()
                .join("\n"),
            None => delta,
        };

        if text.is_empty() {
            PollOutcome::NoNewOutput {
                id: id.to_string(),
                status: entry.status,
            }
        } else {
            PollOutcome::Output {
                id: id.to_string(),
                status: entry.status,
                text,
            }
        }
    }

    /// Terminate a process group and forget it
    pub async fn kill(&self, id: &str) -> KillOutcome {
        let removed = self.processes.lock().await.remove(id);
        let Some(mut entry) = removed else {
            return KillOutcome::NotFound { id: id.to_string() };
        };

        terminate(&mut entry.child, entry.pid, self.kill_grace).await;
        for reader in entry.readers {
            reader.abort();
        }
        info!(id = %id, "Process killed");
        KillOutcome::Terminated { id: id.to_string() }
    }

    /// Kill everything still registered
    pub async fn kill_all(&self) {
        let ids: Vec<ProcessId> = self.processes.lock().await.keys().cloned().collect();
        for id in ids {
            self.kill(&id).await;
        }
    }

    pub async fn list(&self) -> Vec<ProcessSummary> {
        let mut processes = self.processes.lock().await;
        let mut summaries: Vec<ProcessSummary> = processes
            .iter_mut()
            .map(|(id, entry)| {
                entry.refresh();
                entry.summary(id)
            })
            .collect();
        summaries.sort_by_key(|s| s.started_at);
        summaries
    }

    pub async fn status(&self, id: &str) -> Option<ProcessStatus> {
        let mut processes = self.processes.lock().await;
        processes.get_mut(id).map(|entry| {
            entry.refresh();
            entry.status
        })
    }
}

fn new_id() -> ProcessId {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(ID_LEN);
    id
}

/// Append each line from a pipe to the shared buffer
async fn capture_lines<R: AsyncRead + Unpin>(reader: R, output: Arc<Mutex<String>>) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => output.lock().await.push_str(&String::from_utf8_lossy(&line)),
            Err(e) => {
                debug!("Capture pipe closed with error: {}", e);
                break;
            },
        }
    }
}

/// Send a signal to a whole process group; false when no member is left
#[cfg(unix)]
pub(crate) fn signal_group(pgid: u32, signal: &str) -> bool {
    std::process::Command::new("kill")
        .arg(format!("-{}", signal))
        .arg("--")
        .arg(format!("-{}", pgid))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn signal_group(_pgid: u32, _signal: &str) -> bool {
    false
}

/// Poll interval while waiting for a process group to empty
const GROUP_POLL: Duration = Duration::from_millis(25);

/// SIGTERM the group, wait out the grace period, then SIGKILL whatever is left
///
/// The group is signalled whether or not the leader has exited, so
/// backgrounded grandchildren go down with it.
pub(crate) async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    let Some(pgid) = pid else {
        let _ = child.kill().await;
        return;
    };

    let deadline = tokio::time::Instant::now() + grace;
    if signal_group(pgid, "TERM") {
        let _ = tokio::time::timeout_at(deadline, child.wait()).await;
        while signal_group(pgid, "0") && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(GROUP_POLL).await;
        }
    }
    if signal_group(pgid, "0") {
        debug!(pgid = pgid, "Grace period elapsed, forcing kill");
        signal_group(pgid, "KILL");
    }
    // Reap the leader
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        let _ = child.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> (tempfile::TempDir, ProcessRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProcessRegistry::new(dir.path().to_path_buf(), Duration::from_millis(500));
        (dir, registry)
    }

    async fn wait_completed(registry: &ProcessRegistry, id: &str) {
        for _ in 0..200 {
            if matches!(registry.status(id).await, Some(ProcessStatus::Completed { .. })) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("process {} did not complete", id);
    }

    #[tokio::test]
    async fn test_poll_then_poll_again() {
        let (_dir, registry) = registry();
        let id = registry.spawn("printf \"a\\nb\\n\"").await.unwrap();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        wait_completed(&registry, &id).await;
        let first = registry.poll(&id, None).await;
        assert_eq!(first.render(), format!("Shell {} (completed):\na\nb\n", id));
        let second = registry.poll(&id, None).await;
        assert_eq!(second.render(), format!("Shell {} (completed):\n(no new output)", id));
    }

    #[tokio::test]
    async fn test_deltas_concatenate_to_full_output() {
        let (_dir, registry) = registry();
        let id = registry
            .spawn("for i in 1 2 3 4 5; do echo line$i; sleep 0.05; done")
            .await
            .unwrap();

        let mut collected = String::new();
        loop {
            let status = registry.status(&id).await;
            match registry.poll(&id, None).await {
                PollOutcome::Output { text, .. } => collected.push_str(&text),
                PollOutcome::NoNewOutput { .. } => {},
                other => panic!("unexpected {:?}", other),
            }
            if matches!(status, Some(ProcessStatus::Completed { .. })) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        // Drain anything that landed between the status check and the poll
        if let PollOutcome::Output { text, .. } = registry.poll(&id, None).await {
            collected.push_str(&text);
        }
        assert_eq!(collected, "line1\nline2\nline3\nline4\nline5\n");
    }

    #[tokio::test]
    async fn test_filter_consumes_unmatched_lines() {
        let (_dir, registry) = registry();
        let id = registry.spawn("printf \"error: x\\nok\\nerror: y\\n\"").await.unwrap();
        wait_completed(&registry, &id).await;

        let filtered = registry.poll(&id, Some("^error")).await;
        assert_eq!(
            filtered,
            PollOutcome::Output {
                id: id.clone(),
                status: ProcessStatus::Completed { exit_code: 0 },
                text: "error: x\nerror: y".to_string(),
            }
        );
        let after = registry.poll(&id, None).await;
        assert!(matches!(after, PollOutcome::NoNewOutput { .. }));
    }

    #[tokio::test]
    async fn test_filter_matching_nothing_still_advances() {
        let (_dir, registry) = registry();
        let id = registry.spawn("printf \"one\\ntwo\\n\"").await.unwrap();
        wait_completed(&registry, &id).await;

        let filtered = registry.poll(&id, Some("^nomatch$")).await;
        assert_eq!(
            filtered,
            PollOutcome::NoNewOutput {
                id: id.clone(),
                status: ProcessStatus::Completed { exit_code: 0 },
            }
        );
        let after = registry.poll(&id, None).await;
        assert!(matches!(after, PollOutcome::NoNewOutput { .. }));
    }

    #[tokio::test]
    async fn test_invalid_filter_keeps_cursor() {
        let (_dir, registry) = registry();
        let id = registry.spawn("echo hello").await.unwrap();
        wait_completed(&registry, &id).await;

        let bad = registry.poll(&id, Some("(unclosed")).await;
        assert!(matches!(bad, PollOutcome::InvalidFilter { .. }));
        assert!(bad.render().starts_with("Invalid regex filter:"));

        let good = registry.poll(&id, None).await;
        assert_eq!(good.render(), format!("Shell {} (completed):\nhello\n", id));
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (_dir, registry) = registry();
        assert_eq!(
            registry.poll("deadbeef", None).await.render(),
            "No shell found with ID: deadbeef"
        );
        assert_eq!(
            registry.kill("deadbeef").await.render(),
            "No shell found with ID: deadbeef"
        );
    }

    #[tokio::test]
    async fn test_kill_removes_entry() {
        let (_dir, registry) = registry();
        let id = registry.spawn("sleep 30").await.unwrap();
        assert_eq!(registry.status(&id).await, Some(ProcessStatus::Running));

        let outcome = registry.kill(&id).await;
        assert_eq!(outcome.render(), format!("Shell {} has been terminated", id));
        assert_eq!(registry.status(&id).await, None);
        assert!(registry.list().await.is_empty());
    }

    /// True while the pid exists and is not a zombie
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(") ")
                .map(|(_, rest)| !rest.starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_kill_reaches_grandchildren_after_leader_exits() {
        let (dir, registry) = registry();
        let id = registry.spawn("sleep 30 & echo $! > pid.txt").await.unwrap();

        // Wait for the shell to write the pid and exit, leaving sleep behind
        let pid_file = dir.path().join("pid.txt");
        let mut grandchild = None;
        for _ in 0..200 {
            if let Ok(text) = std::fs::read_to_string(&pid_file) {
                if let Ok(pid) = text.trim().parse::<u32>() {
                    grandchild = Some(pid);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let grandchild = grandchild.expect("pid file written");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(is_running(grandchild));

        registry.kill(&id).await;

        let mut alive = true;
        for _ in 0..100 {
            if !is_running(grandchild) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "grandchild {} survived kill", grandchild);
        assert_eq!(registry.status(&id).await, None);
    }

    #[tokio::test]
    async fn test_completed_process_stays_registered() {
        let (_dir, registry) = registry();
        let id = registry.spawn("exit 2").await.unwrap();
        wait_completed(&registry, &id).await;

        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, ProcessStatus::Completed { exit_code: 2 });
    }
}
