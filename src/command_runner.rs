//! The one gate every external package tool is spawned through.
//!
//! Backends and the uninstall executor never touch `std::process::Command`
//! directly; they hold an `Arc<dyn CommandRunner>`. [`SystemRunner`] is the
//! real implementation: it registers the child with the [`ChildRegistry`],
//! drains stdout/stderr on helper threads and enforces an optional timeout,
//! killing the child when it is exceeded.

use crate::error::{PkgTidyError, Result};
use crate::process_guard::{kill_tree, ChildRegistry, CommandProcessGroup};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured result of one finished child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Turn a non-zero exit into a query error; `command` names the call site
    pub fn ensure_success(self, command: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            let code = self
                .exit_code
                .map(|c| format!("exit status {}", c))
                .unwrap_or_else(|| "terminated by signal".to_string());
            let detail = self.stderr.trim();
            let reason = if detail.is_empty() {
                code
            } else {
                format!("{}: {}", code, detail)
            };
            Err(PkgTidyError::query(command, reason))
        }
    }
}

/// Runs an external program to completion and captures its output.
///
/// A spawn failure or timeout is an `Err`; a non-zero exit is an `Ok` with
/// `success == false` so callers decide what a failed exit means to them.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// How a spawned child relates to pkgtidy's own process group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// New process group, no stdin: read-only queries
    Detached,
    /// Same process group, inherited stdin: privileged removals whose
    /// authorization agent may prompt on the terminal. Terminal signals reach
    /// them through the shared foreground group.
    Attached,
}

/// [`CommandRunner`] backed by real processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    isolation: Isolation,
}

impl SystemRunner {
    /// Runner for read-only package queries
    pub fn queries(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            isolation: Isolation::Detached,
        }
    }

    /// Runner for privileged removals
    pub fn privileged(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            isolation: Isolation::Attached,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let command_line = describe(program, args);
        debug!(command = %command_line, "spawning");

        let mut cmd = Command::new(program);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        match self.isolation {
            Isolation::Detached => {
                cmd.stdin(Stdio::null()).in_new_process_group();
            }
            Isolation::Attached => {
                cmd.stdin(Stdio::inherit());
            }
        }
        let group_leader = self.isolation == Isolation::Detached;

        let mut child = cmd
            .spawn()
            .map_err(|e| PkgTidyError::query(command_line.clone(), e.to_string()))?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid, group_leader);
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_thread = thread::spawn(move || drain(stdout));
        let stderr_thread = thread::spawn(move || drain(stderr));

        let kill = || kill_tree(pid, group_leader);
        let waited = wait_with_deadline(&mut child, self.timeout, kill).map_err(|e| {
            kill_tree(pid, group_leader);
            PkgTidyError::query(command_line.clone(), e.to_string())
        });

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        // On failure the reader threads are left detached: a grandchild
        // outside our process group may still hold the pipes open.
        let status = match waited? {
            Waited::Exited(status) => status,
            Waited::TimedOut(limit) => {
                warn!(command = %command_line, "timed out after {}s, killed", limit.as_secs());
                return Err(PkgTidyError::Timeout {
                    command: command_line,
                    secs: limit.as_secs(),
                });
            }
        };
        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        debug!(command = %command_line, code = ?status.code(), "finished");

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.code(),
            success: status.success(),
        })
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The parts of a running child the deadline loop needs
trait PollChild {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;
    fn wait(&mut self) -> io::Result<ExitStatus>;
}

impl PollChild for Child {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }
}

#[derive(Debug)]
enum Waited {
    Exited(ExitStatus),
    TimedOut(Duration),
}

/// Poll `child` until it exits or `timeout` passes. On timeout `kill` is
/// called; when it reports the signal as delivered the child is reaped and
/// the timeout returned. A child we cannot signal (pkexec after it gained
/// root) is waited for without a deadline and its real status returned.
fn wait_with_deadline<C: PollChild>(
    child: &mut C,
    timeout: Option<Duration>,
    mut kill: impl FnMut() -> bool,
) -> io::Result<Waited> {
    let start = Instant::now();
    let mut deadline = timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Waited::Exited(status));
        }
        if let Some(limit) = deadline {
            if start.elapsed() > limit {
                if kill() {
                    child.wait()?;
                    return Ok(Waited::TimedOut(limit));
                }
                warn!(
                    "timed out after {}s but the child cannot be signalled, waiting for it",
                    limit.as_secs()
                );
                deadline = None;
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

/// Human-readable command line for logs and error messages
pub fn describe(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
