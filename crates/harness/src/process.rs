//! Handles onto spawned child processes
//!
//! A [`ManagedProcess`] owns its `Child` behind a lock so liveness can be
//! queried through a shared reference. Shutdown always tries the graceful
//! signal first and escalates to a kill once the timeout expires.

use parking_lot::Mutex;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use glassbox_common::{Error, Result};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How a process ended during shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Already gone before the graceful signal was sent
    AlreadyExited(ExitStatus),
    /// Exited within the timeout after the graceful signal
    Graceful(ExitStatus),
    /// Killed after the timeout expired
    Forced(Option<ExitStatus>),
}

impl ShutdownOutcome {
    pub fn was_forced(&self) -> bool {
        matches!(self, ShutdownOutcome::Forced(_))
    }

    pub fn status(&self) -> Option<ExitStatus> {
        match self {
            ShutdownOutcome::AlreadyExited(status) | ShutdownOutcome::Graceful(status) => {
                Some(*status)
            }
            ShutdownOutcome::Forced(status) => *status,
        }
    }
}

/// A live child process owned by the supervisor
#[derive(Debug)]
pub struct ManagedProcess {
    label: String,
    pid: u32,
    child: Mutex<Child>,
}

impl ManagedProcess {
    /// Spawn `command`, labelling the process for logs and errors.
    pub fn spawn(label: impl Into<String>, command: &mut Command) -> Result<Self> {
        let label = label.into();
        let program = command.get_program().to_string_lossy().to_string();

        let child = command.spawn().map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();
        info!(process = %label, pid, "Started {}", program);

        Ok(Self {
            label,
            pid,
            child: Mutex::new(child),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Hand the piped output streams to the caller (once).
    pub fn take_output_streams(&mut self) -> (Option<ChildStdout>, Option<ChildStderr>) {
        let child = self.child.get_mut();
        (child.stdout.take(), child.stderr.take())
    }

    /// Exit status if the process has terminated, without blocking.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self.child.lock().try_wait() {
            Ok(status) => status,
            Err(e) => {
                debug!(process = %self.label, pid = self.pid, "try_wait failed: {}", e);
                None
            }
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status().and_then(|s| s.code())
    }

    pub fn is_alive(&self) -> bool {
        self.exit_status().is_none()
    }

    /// Wait up to `timeout` for the process to exit.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.exit_status() {
                return Some(status);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Send the graceful termination request.
    #[cfg(unix)]
    pub fn terminate(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            debug!(process = %self.label, pid = self.pid, "SIGTERM failed: {}", e);
        }
    }

    /// Send the graceful termination request.
    ///
    /// Windows has no catchable termination signal for arbitrary children,
    /// so this already ends the process.
    #[cfg(not(unix))]
    pub fn terminate(&self) {
        if let Err(e) = self.child.lock().kill() {
            debug!(process = %self.label, pid = self.pid, "terminate failed: {}", e);
        }
    }

    /// Kill the process and reap it unconditionally.
    pub fn kill_and_wait(&self) -> Option<ExitStatus> {
        let mut child = self.child.lock();
        if let Err(e) = child.kill() {
            // Only fails when the process is already gone.
            debug!(process = %self.label, pid = self.pid, "kill failed: {}", e);
        }
        match child.wait() {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(process = %self.label, pid = self.pid, "wait failed: {}", e);
                None
            }
        }
    }

    /// Graceful signal, wait up to `timeout`, then kill. Never fails.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        if let Some(status) = self.exit_status() {
            debug!(process = %self.label, pid = self.pid, %status, "Already exited");
            return ShutdownOutcome::AlreadyExited(status);
        }

        self.terminate();
        if let Some(status) = self.wait_timeout(timeout) {
            info!(process = %self.label, pid = self.pid, %status, "Stopped");
            return ShutdownOutcome::Graceful(status);
        }

        warn!(
            process = %self.label,
            pid = self.pid,
            timeout_ms = timeout.as_millis() as u64,
            "Did not exit after termination request, killing"
        );
        ShutdownOutcome::Forced(self.kill_and_wait())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    #[test]
    fn spawn_failure_names_program() {
        let err = ManagedProcess::spawn("main", &mut Command::new("/nonexistent/glassbox-bin"))
            .unwrap_err();
        match err {
            Error::Spawn { program, .. } => assert_eq!(program, "/nonexistent/glassbox-bin"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reports_exit_code_once_finished() {
        let process = ManagedProcess::spawn("main", &mut sh("exit 3")).unwrap();
        let status = process.wait_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(status.code(), Some(3));
        assert!(!process.is_alive());
        assert_eq!(process.exit_code(), Some(3));
    }

    #[test]
    fn graceful_shutdown() {
        let process = ManagedProcess::spawn("main", &mut sh("sleep 30")).unwrap();
        assert!(process.is_alive());

        let outcome = process.shutdown(Duration::from_secs(5));
        assert!(matches!(outcome, ShutdownOutcome::Graceful(_)), "{outcome:?}");
        assert!(!process.is_alive());
    }

    #[test]
    fn escalates_to_kill_when_term_is_ignored() {
        let process =
            ManagedProcess::spawn("main", &mut sh("trap '' TERM; while :; do sleep 1; done"))
                .unwrap();
        // Let the shell install its trap.
        std::thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        let outcome = process.shutdown(Duration::from_millis(300));
        assert!(outcome.was_forced(), "{outcome:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!process.is_alive());
    }

    #[test]
    fn shutdown_of_exited_process_is_quiet() {
        let process = ManagedProcess::spawn("helper", &mut sh("true")).unwrap();
        process.wait_timeout(Duration::from_secs(5)).unwrap();
        let outcome = process.shutdown(Duration::from_secs(1));
        assert!(matches!(outcome, ShutdownOutcome::AlreadyExited(_)));
    }
}
