//! Snap backend: `snap list` with a static denylist of platform snaps.
//!
//! Snaps need no install-time heuristic; bases, runtimes and theme snaps are
//! recognisable by name alone.

use crate::backend::PackageBackend;
use crate::command_runner::{describe, CommandRunner};
use crate::config::{AppConfig, SnapPolicy, ToolPaths};
use crate::error::Result;
use crate::icons::IconResolver;
use crate::types::{PackageRecord, PackageSource};
use std::path::PathBuf;
use std::sync::Arc;

/// Minimum columns in a `snap list` row: Name Version Rev Tracking Publisher Notes
const SNAP_LIST_FIELDS: usize = 6;

/// One parsed row of `snap list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapListEntry<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub revision: &'a str,
    pub tracking: &'a str,
    pub publisher: &'a str,
    pub notes: &'a str,
}

pub struct SnapBackend {
    runner: Arc<dyn CommandRunner>,
    policy: SnapPolicy,
    tools: ToolPaths,
    icons: IconResolver,
}

impl SnapBackend {
    pub fn new(config: &AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            policy: config.snap.clone(),
            tools: config.tools.clone(),
            icons: IconResolver::new(&config.icon_root),
        }
    }

    /// Installed snaps minus the denylist
    pub fn snaps(&self) -> Result<Vec<PackageRecord>> {
        let args = ["list"];
        let output = self
            .runner
            .run(&self.tools.snap, &args)?
            .ensure_success(&describe(&self.tools.snap, &args))?;

        Ok(parse_snap_list(&output.stdout)
            .into_iter()
            .filter(|entry| !self.policy.excludes(entry.name))
            .map(|entry| {
                let icon = self.find_icon(entry.name);
                PackageRecord::snap(entry.name, entry.version, entry.publisher, icon)
            })
            .collect())
    }
}

impl PackageBackend for SnapBackend {
    fn source(&self) -> PackageSource {
        PackageSource::Snap
    }

    fn is_available(&self) -> bool {
        self.tools.snap_binary.exists()
    }

    fn list_packages(&self) -> Result<Vec<PackageRecord>> {
        self.snaps()
    }

    fn find_icon(&self, name: &str) -> Option<PathBuf> {
        self.icons.for_snap(name)
    }
}

/// Parse `snap list` output. The header row is skipped; rows with fewer than
/// six whitespace-separated columns are ignored.
pub fn parse_snap_list(stdout: &str) -> Vec<SnapListEntry<'_>> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < SNAP_LIST_FIELDS {
                return None;
            }
            Some(SnapListEntry {
                name: parts[0],
                version: parts[1],
                revision: parts[2],
                tracking: parts[3],
                publisher: parts[4],
                notes: parts[5],
            })
        })
        .collect()
}
