//! Shared fixtures: a scripted stand-in for dpkg-query, apt-mark, snap and
//! pkexec, plus configs pointing at temporary directories.

#![allow(dead_code)]

use pkgtidy::error::{PkgTidyError, Result};
use pkgtidy::{AppConfig, CommandOutput, CommandRunner};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        success: true,
    }
}

pub fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(code),
        success: false,
    }
}

/// Scripted package tools. Unset answers behave like a missing package or a
/// failing tool.
#[derive(Default)]
pub struct FakeSystem {
    /// `apt-mark showmanual` stdout; `None` makes it exit 100
    pub manual: Option<String>,
    /// Per-package `db-fsys:Last-Modified` values
    pub timestamps: HashMap<String, i64>,
    /// Packages whose timestamp query times out
    pub timed_out: HashSet<String>,
    /// Packages whose timestamp query cannot even be spawned
    pub spawn_failures: HashSet<String>,
    /// Bulk `dpkg-query -W` stdout; `None` makes it exit 2
    pub details: Option<String>,
    /// `snap list` stdout; `None` makes it exit 1
    pub snap_list: Option<String>,
    /// Answer for anything run through pkexec
    pub removal: Option<CommandOutput>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manual(mut self, names: &[&str]) -> Self {
        self.manual = Some(names.iter().map(|n| format!("{}\n", n)).collect());
        self
    }

    pub fn with_timestamp(mut self, name: &str, ts: i64) -> Self {
        self.timestamps.insert(name.to_string(), ts);
        self
    }

    pub fn with_timestamp_timeout(mut self, name: &str) -> Self {
        self.timed_out.insert(name.to_string());
        self
    }

    pub fn with_timestamp_spawn_failure(mut self, name: &str) -> Self {
        self.spawn_failures.insert(name.to_string());
        self
    }

    pub fn with_details(mut self, rows: &[(&str, &str, &str)]) -> Self {
        self.details = Some(
            rows.iter()
                .map(|(n, v, d)| format!("{}\t{}\t{}\n", n, v, d))
                .collect(),
        );
        self
    }

    pub fn with_snap_list(mut self, stdout: &str) -> Self {
        self.snap_list = Some(stdout.to_string());
        self
    }

    pub fn with_removal(mut self, output: CommandOutput) -> Self {
        self.removal = Some(output);
        self
    }

    /// Every invocation so far, program first
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Was a per-package timestamp query issued for `name`?
    pub fn timestamp_queried(&self, name: &str) -> bool {
        self.calls()
            .iter()
            .any(|c| c[0] == "dpkg-query" && c.len() == 4 && c[3] == name)
    }

    pub fn ran(&self, program: &str) -> bool {
        self.calls().iter().any(|c| c[0] == program)
    }
}

impl CommandRunner for FakeSystem {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        self.calls.lock().unwrap().push(call);

        let output = match (program, args) {
            ("apt-mark", ["showmanual"]) => match &self.manual {
                Some(stdout) => ok(stdout),
                None => failed(100, "E: dpkg database locked"),
            },
            ("dpkg-query", ["-W", _, package]) if self.timed_out.contains(*package) => {
                return Err(PkgTidyError::Timeout {
                    command: format!("dpkg-query -W {}", package),
                    secs: 30,
                });
            }
            ("dpkg-query", ["-W", _, package]) if self.spawn_failures.contains(*package) => {
                return Err(PkgTidyError::query(
                    "dpkg-query",
                    "No such file or directory (os error 2)",
                ));
            }
            ("dpkg-query", ["-W", _, package]) => match self.timestamps.get(*package) {
                Some(ts) => ok(&format!("{}\n", ts)),
                None => failed(1, &format!("dpkg-query: no packages found matching {}", package)),
            },
            ("dpkg-query", ["-W", _]) => match &self.details {
                Some(stdout) => ok(stdout),
                None => failed(2, "dpkg-query: error: database unreadable"),
            },
            ("snap", ["list"]) => match &self.snap_list {
                Some(stdout) => ok(stdout),
                None => failed(1, "error: cannot communicate with server"),
            },
            ("pkexec", _) => self.removal.clone().unwrap_or_else(|| ok("")),
            _ => failed(127, "command not found"),
        };
        Ok(output)
    }
}

/// Config whose tool binaries exist inside `dir` and whose icon lookups are
/// rooted there too
pub fn config_in(dir: &TempDir) -> AppConfig {
    let bin = dir.path().join("usr/bin");
    fs::create_dir_all(&bin).unwrap();
    let apt = bin.join("apt");
    let snap = bin.join("snap");
    fs::write(&apt, "").unwrap();
    fs::write(&snap, "").unwrap();

    let mut config = AppConfig::default();
    config.tools.apt_binary = apt;
    config.tools.snap_binary = snap;
    config.icon_root = dir.path().to_path_buf();
    config
}

/// Config whose tool binaries do not exist
pub fn config_without_tools(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.tools.apt_binary = dir.path().join("missing/apt");
    config.tools.snap_binary = dir.path().join("missing/snap");
    config.icon_root = dir.path().to_path_buf();
    config
}

pub fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"icon").unwrap();
}

pub const SNAP_LIST: &str = "\
Name               Version          Rev    Tracking         Publisher     Notes
core22             20240111         1122   latest/stable    canonical✓    base
firefox            122.0-2          3728   latest/stable    mozilla✓      -
gnome-46-2404      0+git.1          90     latest/stable    canonical✓    -
gtk-common-themes  0.1-81-g442e511  1535   latest/stable    canonical✓    -
spotify            1.2.26.1187      74     latest/stable    spotify✓      -
broken row
";
