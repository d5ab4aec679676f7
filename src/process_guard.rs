//! Lifecycle management for spawned package tools
//!
//! Every `dpkg-query`, `apt-mark`, `snap` or `pkexec` child is registered here
//! while it runs. If pkgtidy is interrupted (SIGINT/SIGTERM/SIGHUP) or the
//! guard is dropped, registered children get SIGTERM, a grace period, then
//! SIGKILL, so a hung query never outlives the process that started it.
//!
//! Query children run in their own process group with a parent-death signal
//! so a timeout can kill the whole tree. Privileged removals stay in the
//! caller's group because pkexec may need the terminal for its authorization
//! agent. pkexec is setuid, so the kernel drops any parent-death signal at
//! exec and, once authorized, pkgtidy may not be allowed to signal it at all.

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of running child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    /// PIDs currently running
    pids: HashSet<u32>,
    /// PIDs that lead their own process group
    group_leaders: HashSet<u32>,
    /// Set once cleanup has started
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Register a running child; `group_leader` when it was spawned with
    /// [`CommandProcessGroup::in_new_process_group`]
    pub fn register(&mut self, pid: u32, group_leader: bool) {
        self.pids.insert(pid);
        if group_leader {
            self.group_leaders.insert(pid);
        }
        tracing::debug!(pid, group_leader, "registered child process");
    }

    /// Forget a child that has exited
    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        self.group_leaders.remove(&pid);
        tracing::debug!(pid, "unregistered child process");
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked children: SIGTERM, wait up to `grace_period`,
    /// then SIGKILL whatever is left.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            tracing::debug!("cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            return;
        }

        tracing::info!("terminating {} child process(es)", self.pids.len());

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            self.signal_child(pid, Signal::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                tracing::info!("all child processes terminated gracefully");
                self.pids.clear();
                self.group_leaders.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if is_process_alive(pid) {
                tracing::warn!(pid, "child did not terminate, sending SIGKILL");
                self.signal_child(pid, Signal::SIGKILL);
            }
        }

        self.pids.clear();
        self.group_leaders.clear();
    }

    fn signal_child(&self, pid: u32, sig: Signal) {
        if self.group_leaders.contains(&pid) {
            if let Err(e) = send_signal_to_group(pid, sig) {
                tracing::warn!(pid, "failed to signal process group: {}", e);
            } else {
                return;
            }
        }
        if let Err(e) = send_signal(pid, sig) {
            tracing::warn!(pid, "failed to signal process: {}", e);
        }
    }
}

fn send_signal(pid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), sig)
}

/// Negative PID addresses the whole group
fn send_signal_to_group(pgid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), sig)
}

/// Kill a timed-out child and everything in its group. `false` when no
/// signal could be delivered (typically EPERM for a child now running as root).
pub(crate) fn kill_tree(pid: u32, group_leader: bool) -> bool {
    if group_leader && send_signal_to_group(pid, Signal::SIGKILL).is_ok() {
        return true;
    }
    match send_signal(pid, Signal::SIGKILL) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(pid, "cannot kill child: {}", e);
            false
        }
    }
}

/// Alive means present and neither zombie nor dead
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state letter
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    true
}

/// RAII guard that terminates all registered children on drop.
/// Hold one for the lifetime of `main`.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(2));
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP that clean up children and
/// exit with `128 + signal`. Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            tracing::info!(signal = sig, "received signal, cleaning up");

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for `std::process::Command` controlling how a child is
/// tied to pkgtidy
pub trait CommandProcessGroup {
    /// Run the child as leader of a new process group, dying with the parent
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
