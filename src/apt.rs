//! APT backend: dpkg/apt-mark queries plus manual-install classification.
//!
//! Acquisition runs in two strictly ordered phases:
//!
//! 1. `manual_list()` asks `apt-mark showmanual` for candidates and filters
//!    them through [`ClassificationContext`], one `dpkg-query` per candidate
//!    that survives the name lists.
//! 2. `package_details()` does a single bulk `dpkg-query` and keeps the rows
//!    whose names survived phase 1.

use crate::backend::PackageBackend;
use crate::classifier::{ClassificationContext, TimestampSource, Verdict};
use crate::command_runner::{describe, CommandRunner};
use crate::config::{AppConfig, ClassificationPolicy, ToolPaths};
use crate::error::Result;
use crate::icons::IconResolver;
use crate::types::{PackageRecord, PackageSource};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

const LAST_MODIFIED_FORMAT: &str = "-f=${db-fsys:Last-Modified}\n";
const DETAILS_FORMAT: &str = "-f=${Package}\t${Version}\t${Description}\n";

pub struct AptBackend {
    runner: Arc<dyn CommandRunner>,
    policy: ClassificationPolicy,
    tools: ToolPaths,
    icons: IconResolver,
}

impl AptBackend {
    pub fn new(config: &AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            policy: config.classification.clone(),
            tools: config.tools.clone(),
            icons: IconResolver::new(&config.icon_root),
        }
    }

    pub fn policy(&self) -> &ClassificationPolicy {
        &self.policy
    }

    /// Last-modified time of the sentinel package, `0` when unknown
    pub fn system_reference_timestamp(&self) -> i64 {
        self.last_modified(&self.policy.sentinel_package).unwrap_or(0)
    }

    /// Everything `apt-mark showmanual` reports, unfiltered
    pub fn raw_manual_list(&self) -> Result<BTreeSet<String>> {
        let args = ["showmanual"];
        let output = self
            .runner
            .run(&self.tools.apt_mark, &args)?
            .ensure_success(&describe(&self.tools.apt_mark, &args))?;
        Ok(parse_name_list(&output.stdout))
    }

    /// Classification context for the live system
    pub fn classification_context(&self) -> ClassificationContext {
        ClassificationContext::resolve(&self.policy, self)
    }

    /// Packages the user installed on purpose. Empty on any failure.
    pub fn manual_list(&self) -> BTreeSet<String> {
        let raw = match self.raw_manual_list() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("could not read manual package marks: {}", e);
                return BTreeSet::new();
            }
        };
        let context = self.classification_context();
        let kept = context.classify(&raw, self);
        debug!(
            candidates = raw.len(),
            kept = kept.len(),
            reference = context.system_reference_timestamp,
            "classified manual packages"
        );
        kept
    }

    /// Verdict for each raw manual candidate, optionally restricted to `only`
    pub fn explain(&self, only: &[String]) -> Result<Vec<(String, Verdict)>> {
        let raw = self.raw_manual_list()?;
        let context = self.classification_context();
        let candidates: Vec<&String> = if only.is_empty() {
            raw.iter().collect()
        } else {
            raw.iter().filter(|name| only.contains(name)).collect()
        };
        Ok(context.explain(candidates, self))
    }

    /// Bulk-query installed packages and keep those named in `manual`
    pub fn package_details(&self, manual: &BTreeSet<String>) -> Result<Vec<PackageRecord>> {
        if manual.is_empty() {
            return Ok(Vec::new());
        }
        let args = ["-W", DETAILS_FORMAT];
        let output = self
            .runner
            .run(&self.tools.dpkg_query, &args)?
            .ensure_success(&format!("{} -W", self.tools.dpkg_query))?;

        Ok(parse_package_details(&output.stdout, manual)
            .into_iter()
            .map(|(name, version, description)| {
                let icon = self.find_icon(name);
                PackageRecord::apt(name, version, description, icon)
            })
            .collect())
    }
}

impl TimestampSource for AptBackend {
    fn last_modified(&self, package: &str) -> Option<i64> {
        let args = ["-W", LAST_MODIFIED_FORMAT, package];
        let output = match self.runner.run(&self.tools.dpkg_query, &args) {
            Ok(output) if output.success => output,
            Ok(_) | Err(_) => {
                debug!(package, "no last-modified timestamp");
                return None;
            }
        };
        parse_timestamp(&output.stdout)
    }
}

impl PackageBackend for AptBackend {
    fn source(&self) -> PackageSource {
        PackageSource::Apt
    }

    fn is_available(&self) -> bool {
        self.tools.apt_binary.exists()
    }

    fn list_packages(&self) -> Result<Vec<PackageRecord>> {
        let manual = self.manual_list();
        self.package_details(&manual)
    }

    fn find_icon(&self, name: &str) -> Option<PathBuf> {
        self.icons.for_apt(name)
    }
}

/// One name per line; blank lines ignored
pub fn parse_name_list(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// First line of `dpkg-query`'s last-modified output as epoch seconds.
/// Packages without filesystem metadata print an empty line.
pub fn parse_timestamp(stdout: &str) -> Option<i64> {
    stdout.lines().next()?.trim().parse().ok()
}

/// Rows of `name\tversion\tdescription` whose name is in `wanted`.
///
/// Lines with fewer than three fields (including the indented continuation
/// lines of long descriptions) are skipped. Multi-arch duplicates keep the
/// first row.
pub fn parse_package_details<'a>(
    stdout: &'a str,
    wanted: &BTreeSet<String>,
) -> Vec<(&'a str, &'a str, &'a str)> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for line in stdout.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            continue;
        }
        let (name, version, description) = (parts[0], parts[1], parts[2]);
        if wanted.contains(name) && seen.insert(name) {
            rows.push((name, version, description));
        }
    }
    rows
}
