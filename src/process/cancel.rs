//! Process-wide cancellation
//!
//! One token is shared by the agent loop and the foreground shell. Raising
//! it sets the flag, terminates the attached foreground process group and
//! wakes every waiter. Background processes are never touched.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::Notify;
use tracing::{debug, info};

use super::signal_group;

/// No foreground process attached
const NO_PID: u32 = 0;

#[derive(Debug, Default)]
pub struct CancellationToken {
    cancelled: AtomicBool,
    foreground: AtomicU32,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let pid = self.foreground.load(Ordering::SeqCst);
        if pid != NO_PID {
            info!(pid = pid, "Cancelling foreground process");
            signal_group(pid, "TERM");
        }
        self.notify.notify_waiters();
    }

    /// Clear the flag at the start of a new request
    pub fn reset(&self) {
        debug!("Cancellation flag cleared");
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is raised
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Record the foreground process that `cancel` should terminate
    pub(crate) fn attach(&self, pid: u32) {
        self.foreground.store(pid, Ordering::SeqCst);
    }

    pub(crate) fn detach(&self) {
        self.foreground.store(NO_PID, Ordering::SeqCst);
    }

    pub fn foreground_pid(&self) -> Option<u32> {
        match self.foreground.load(Ordering::SeqCst) {
            NO_PID => None,
            pid => Some(pid),
        }
    }
}
