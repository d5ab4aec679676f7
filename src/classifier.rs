//! Timestamp-based classification of "manually installed" APT packages.
//!
//! `apt-mark showmanual` also reports everything the installer marked manual
//! during OS setup. A candidate is kept by layering three signals, strongest
//! first:
//!
//! 1. **Whitelist**: exact name match, kept unconditionally.
//! 2. **Blacklist**: name prefix match, dropped without querying anything.
//! 3. **Install time**: kept only when its last-modified timestamp is
//!    strictly later than the sentinel package's timestamp plus the margin.
//!
//! An unknown candidate timestamp drops the candidate (fail-closed). An
//! unknown sentinel timestamp counts as `0`, leaving the date filter
//! effectively open.

use crate::config::ClassificationPolicy;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Source of per-package last-modified timestamps (Unix seconds).
///
/// `None` covers every failure: package absent, tool missing, timeout,
/// unparsable output.
pub trait TimestampSource {
    fn last_modified(&self, package: &str) -> Option<i64>;
}

/// Why a candidate was kept or dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Whitelisted,
    Blacklisted { prefix: String },
    TimestampUnavailable,
    InstalledWithSystem { timestamp: i64, floor: i64 },
    InstalledAfterSystem { timestamp: i64, floor: i64 },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Whitelisted | Self::InstalledAfterSystem { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whitelisted => write!(f, "kept: whitelisted"),
            Self::Blacklisted { prefix } => write!(f, "dropped: matches prefix {:?}", prefix),
            Self::TimestampUnavailable => write!(f, "dropped: install time unknown"),
            Self::InstalledWithSystem { timestamp, floor } => {
                write!(f, "dropped: installed at {} (not after {})", timestamp, floor)
            }
            Self::InstalledAfterSystem { timestamp, floor } => {
                write!(f, "kept: installed at {} (after {})", timestamp, floor)
            }
        }
    }
}

/// Per-run classification inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationContext {
    pub system_reference_timestamp: i64,
    pub blacklist_patterns: Vec<String>,
    pub whitelist_names: BTreeSet<String>,
    pub date_margin_secs: i64,
}

impl ClassificationContext {
    /// Build a context from a policy and an already-known reference time
    pub fn new(policy: &ClassificationPolicy, system_reference_timestamp: i64) -> Self {
        Self {
            system_reference_timestamp,
            blacklist_patterns: policy.blacklist_patterns.clone(),
            whitelist_names: policy.whitelist_names.clone(),
            date_margin_secs: policy.date_margin_secs,
        }
    }

    /// Build a context, looking the sentinel package up in `timestamps`
    pub fn resolve(policy: &ClassificationPolicy, timestamps: &dyn TimestampSource) -> Self {
        let reference = timestamps
            .last_modified(&policy.sentinel_package)
            .unwrap_or_else(|| {
                debug!(
                    sentinel = %policy.sentinel_package,
                    "sentinel timestamp unavailable, using 0"
                );
                0
            });
        Self::new(policy, reference)
    }

    /// Timestamps must be strictly greater than this to count as user installs
    pub fn floor(&self) -> i64 {
        self.system_reference_timestamp
            .saturating_add(self.date_margin_secs)
    }

    /// Decide one candidate. Only queries `timestamps` when neither list
    /// settles the question.
    pub fn verdict(&self, name: &str, timestamps: &dyn TimestampSource) -> Verdict {
        if self.whitelist_names.contains(name) {
            return Verdict::Whitelisted;
        }

        if let Some(prefix) = self
            .blacklist_patterns
            .iter()
            .find(|p| name.starts_with(p.as_str()))
        {
            return Verdict::Blacklisted {
                prefix: prefix.clone(),
            };
        }

        let floor = self.floor();
        match timestamps.last_modified(name) {
            None => Verdict::TimestampUnavailable,
            Some(timestamp) if timestamp > floor => {
                Verdict::InstalledAfterSystem { timestamp, floor }
            }
            Some(timestamp) => Verdict::InstalledWithSystem { timestamp, floor },
        }
    }

    /// Verdict for every candidate, in name order
    pub fn explain<'a, I>(
        &self,
        candidates: I,
        timestamps: &dyn TimestampSource,
    ) -> Vec<(String, Verdict)>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let unique: BTreeSet<&String> = candidates.into_iter().collect();
        unique
            .into_iter()
            .map(|name| {
                let verdict = self.verdict(name, timestamps);
                debug!(package = %name, %verdict, "classified");
                (name.clone(), verdict)
            })
            .collect()
    }

    /// The accepted subset of `candidates`
    pub fn classify<'a, I>(
        &self,
        candidates: I,
        timestamps: &dyn TimestampSource,
    ) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.explain(candidates, timestamps)
            .into_iter()
            .filter(|(_, verdict)| verdict.is_accepted())
            .map(|(name, _)| name)
            .collect()
    }
}
