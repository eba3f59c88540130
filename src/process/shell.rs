//! Foreground shell execution

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::terminate;

/// Result of a foreground command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    TimedOut {
        timeout: Duration,
    },
    Cancelled,
    SpawnFailed(String),
}

impl RunOutcome {
    /// Text handed back to the model
    pub fn render(&self) -> String {
        match self {
            Self::Completed {
                stdout,
                stderr,
                exit_code,
            } => {
                let mut output = stdout.clone();
                if !stderr.is_empty() {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str("[stderr]\n");
                    output.push_str(stderr);
                }
                if *exit_code != 0 {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str(&format!("[exit code: {}]", exit_code));
                }
                if output.is_empty() {
                    output = "Command executed successfully (no output)".to_string();
                }
                output
            },
            Self::TimedOut { timeout } => {
                format!("Command timed out after {} seconds", format_seconds(*timeout))
            },
            Self::Cancelled => "Command cancelled by user".to_string(),
            Self::SpawnFailed(e) => format!("Error executing command: {}", e),
        }
    }
}

fn format_seconds(d: Duration) -> String {
    let ms = d.as_millis();
    if ms % 1000 == 0 {
        (ms / 1000).to_string()
    } else {
        format!("{:.1}", d.as_secs_f64())
    }
}

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>, String, String),
    TimedOut,
    Cancelled,
}

/// Run a command to completion, honoring timeout and cancellation
pub async fn run(
    command: &str,
    working_dir: &Path,
    timeout: Duration,
    grace: Duration,
    cancel: &CancellationToken,
) -> RunOutcome {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to spawn '{}': {}", command, e);
            return RunOutcome::SpawnFailed(e.to_string());
        },
    };
    let pid = child.id();
    if let Some(pid) = pid {
        cancel.attach(pid);
    }
    debug!(pid = ?pid, command = %command, "Foreground command started");

    let mut stdout = child.stdout.take().map(|s| tokio::spawn(drain(s)));
    let mut stderr = child.stderr.take().map(|s| tokio::spawn(drain(s)));

    // The deadline covers the pipes too: a backgrounded grandchild can hold
    // them open long after the shell itself exits
    let waited = tokio::select! {
        (status, out, err) = async {
            let status = child.wait().await;
            (status, collect(stdout.as_mut()).await, collect(stderr.as_mut()).await)
        } => Waited::Exited(status, out, err),
        _ = tokio::time::sleep(timeout) => Waited::TimedOut,
        _ = cancel.cancelled() => Waited::Cancelled,
    };

    let outcome = match waited {
        Waited::Exited(Ok(status), stdout, stderr) => RunOutcome::Completed {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
        },
        Waited::Exited(Err(e), ..) => RunOutcome::SpawnFailed(format!("Wait failed: {}", e)),
        Waited::TimedOut => {
            info!(pid = ?pid, "Foreground command timed out after {:?}", timeout);
            terminate(&mut child, pid, grace).await;
            RunOutcome::TimedOut { timeout }
        },
        Waited::Cancelled => {
            info!(pid = ?pid, "Foreground command cancelled");
            terminate(&mut child, pid, grace).await;
            RunOutcome::Cancelled
        },
    };
    for reader in stdout.iter().chain(stderr.iter()) {
        reader.abort();
    }
    cancel.detach();
    outcome
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!("Pipe read ended with error: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(handle: Option<&mut JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const GRACE: Duration = Duration::from_millis(200);

    async fn run_in_tmp(command: &str, timeout: Duration) -> RunOutcome {
        let dir = tempfile::tempdir().unwrap();
        run(command, dir.path(), timeout, GRACE, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_run_captures_both_streams() {
        let outcome = run_in_tmp("echo out; echo err >&2; exit 3", Duration::from_secs(5)).await;
        assert_eq!(
            outcome.render(),
            "out\n\n[stderr]\nerr\n\n[exit code: 3]"
        );
    }

    #[tokio::test]
    async fn test_run_no_output() {
        let outcome = run_in_tmp("true", Duration::from_secs(5)).await;
        assert_eq!(outcome.render(), "Command executed successfully (no output)");
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let outcome = run_in_tmp("sleep 5", Duration::from_millis(200)).await;
        assert_eq!(
            outcome,
            RunOutcome::TimedOut {
                timeout: Duration::from_millis(200)
            }
        );
        assert_eq!(outcome.render(), "Command timed out after 0.2 seconds");
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let token = Arc::new(CancellationToken::new());
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                token.cancel();
            })
        };
        let started = std::time::Instant::now();
        let outcome = run("sleep 5", dir.path(), Duration::from_secs(10), GRACE, &token).await;
        canceller.await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(token.foreground_pid(), None);
    }

    #[tokio::test]
    async fn test_run_times_out_when_grandchild_holds_pipes() {
        let started = std::time::Instant::now();
        let outcome = run_in_tmp("sleep 5 & echo hi", Duration::from_millis(300)).await;
        assert_eq!(
            outcome,
            RunOutcome::TimedOut {
                timeout: Duration::from_millis(300)
            }
        );
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_run_cancelled_while_grandchild_holds_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let token = Arc::new(CancellationToken::new());
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                token.cancel();
            })
        };
        let started = std::time::Instant::now();
        let outcome = run(
            "sleep 5 & echo started",
            dir.path(),
            Duration::from_secs(10),
            GRACE,
            &token,
        )
        .await;
        canceller.await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_millis(120_000)), "120");
        assert_eq!(format_seconds(Duration::from_millis(1_500)), "1.5");
    }
}
