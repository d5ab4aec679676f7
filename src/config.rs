//! Configuration management module
//!
//! Classification policy, snap exclusions, tool locations and timeouts. Every
//! field has a default so a config file only needs the keys it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One full day: packages touched within this window after the sentinel
/// were installed during OS setup.
pub const DEFAULT_DATE_MARGIN_SECS: i64 = 86_400;

/// Base-install meta-package whose timestamp marks "system install time".
pub const DEFAULT_SENTINEL_PACKAGE: &str = "ubuntu-minimal";

const DEFAULT_BLACKLIST: &[&str] = &[
    "ubuntu-",
    "linux-",
    "grub-",
    "shim-",
    "yaru-",
    "gnome-",
    "language-",
    "fonts-",
    "lib",
    "plymouth",
    "xdg-",
    "xorg",
    "xkb-",
    "xcursor-",
    "ibus",
    "im-config",
    "gstreamer",
    "printer-driver-",
    "cups",
    "avahi-",
    "brltty",
    "wpasupplicant",
    "network-manager",
    "rfkill",
    "policykit-",
    "packagekit",
    "update-",
    "software-properties-",
    "apt-",
    "dpkg",
    "snap",
];

const DEFAULT_WHITELIST: &[&str] = &[
    "code",
    "git",
    "git-all",
    "nodejs",
    "npm",
    "docker-compose",
    "vlc",
    "firefox",
    "curl",
    "wget",
    "cmake",
    "clang",
    "build-essential",
    "python3-pip",
    "gradle",
    "maven",
    "openjdk-17-jdk",
    "openjdk-21-jdk",
    "postgresql",
    "mariadb-server",
    "php",
    "composer",
    "pandoc",
    "geany",
    "thunderbird",
    "libreoffice-writer",
    "libreoffice-calc",
    "libreoffice-impress",
    "transmission-gtk",
    "rhythmbox",
    "remmina",
    "snapd",
    "termius-app",
    "hashcat",
    "wireshark",
];

const DEFAULT_SNAP_EXCLUDED: &[&str] = &[
    "core",
    "core18",
    "core20",
    "core22",
    "snapd",
    "bare",
    "gtk-common-themes",
    "gnome-3-28-1804",
    "gnome-3-34-1804",
    "gnome-3-38-2004",
    "gnome-42-2204",
    "wine-platform-6-stable",
    "wine-platform-runtime",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Policy for deciding which "manual" APT packages the user really chose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationPolicy {
    /// Package whose last-modified time is taken as the system install time
    pub sentinel_package: String,
    /// Seconds after the system install time that still count as OS setup
    pub date_margin_secs: i64,
    /// Name prefixes of base-system, library and infrastructure packages
    pub blacklist_patterns: Vec<String>,
    /// Exact names that are always kept, even when a prefix matches
    pub whitelist_names: BTreeSet<String>,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            sentinel_package: DEFAULT_SENTINEL_PACKAGE.to_string(),
            date_margin_secs: DEFAULT_DATE_MARGIN_SECS,
            blacklist_patterns: owned(DEFAULT_BLACKLIST),
            whitelist_names: DEFAULT_WHITELIST.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Static denylist for platform and runtime snaps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapPolicy {
    pub excluded_names: BTreeSet<String>,
    pub excluded_prefixes: Vec<String>,
}

impl Default for SnapPolicy {
    fn default() -> Self {
        Self {
            excluded_names: DEFAULT_SNAP_EXCLUDED.iter().map(|s| (*s).to_string()).collect(),
            excluded_prefixes: vec!["gnome-".to_string()],
        }
    }
}

impl SnapPolicy {
    /// Check whether a snap is platform noise rather than a user install
    pub fn excludes(&self, name: &str) -> bool {
        self.excluded_names.contains(name)
            || self.excluded_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

/// Locations of the external tools. Availability checks use the absolute
/// binaries; invocations use the command names through `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub apt_binary: PathBuf,
    pub snap_binary: PathBuf,
    pub dpkg_query: String,
    pub apt_mark: String,
    pub apt_get: String,
    pub snap: String,
    pub privilege_wrapper: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            apt_binary: PathBuf::from("/usr/bin/apt"),
            snap_binary: PathBuf::from("/usr/bin/snap"),
            dpkg_query: "dpkg-query".to_string(),
            apt_mark: "apt-mark".to_string(),
            apt_get: "apt-get".to_string(),
            snap: "snap".to_string(),
            privilege_wrapper: "pkexec".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub classification: ClassificationPolicy,
    pub snap: SnapPolicy,
    pub tools: ToolPaths,
    /// Budget for each read-only query; `null` waits forever
    pub query_timeout_secs: Option<u64>,
    /// Budget for a privileged removal, including the authorization prompt
    pub uninstall_timeout_secs: Option<u64>,
    /// Filesystem root that icon paths are resolved against
    pub icon_root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            classification: ClassificationPolicy::default(),
            snap: SnapPolicy::default(),
            tools: ToolPaths::default(),
            query_timeout_secs: Some(30),
            uninstall_timeout_secs: Some(600),
            icon_root: PathBuf::from("/"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Load `path` when given, otherwise the defaults; validated either way
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize configuration to JSON")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let policy = &self.classification;
        if policy.sentinel_package.trim().is_empty() {
            anyhow::bail!("Sentinel package must be specified");
        }
        if policy.date_margin_secs < 0 {
            anyhow::bail!("Date margin must not be negative");
        }
        if policy.blacklist_patterns.iter().any(|p| p.trim().is_empty()) {
            // An empty prefix would match every package
            anyhow::bail!("Blacklist patterns must not be empty strings");
        }
        if policy.whitelist_names.iter().any(|n| n.trim().is_empty()) {
            anyhow::bail!("Whitelist names must not be empty strings");
        }
        if self.snap.excluded_prefixes.iter().any(|p| p.trim().is_empty()) {
            anyhow::bail!("Snap exclusion prefixes must not be empty strings");
        }

        if self.query_timeout_secs == Some(0) || self.uninstall_timeout_secs == Some(0) {
            anyhow::bail!("Timeouts must be at least one second (use null to disable)");
        }

        let tools = &self.tools;
        let commands = [
            &tools.dpkg_query,
            &tools.apt_mark,
            &tools.apt_get,
            &tools.snap,
            &tools.privilege_wrapper,
        ];
        if commands.iter().any(|c| c.trim().is_empty())
            || tools.apt_binary.as_os_str().is_empty()
            || tools.snap_binary.as_os_str().is_empty()
        {
            anyhow::bail!("Tool paths must not be empty");
        }

        Ok(())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }

    pub fn uninstall_timeout(&self) -> Option<Duration> {
        self.uninstall_timeout_secs.map(Duration::from_secs)
    }
}
