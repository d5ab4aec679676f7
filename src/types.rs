//! Package record model shared between backends and consumers.
//!
//! A [`PackageRecord`] is an immutable snapshot produced once per acquisition
//! cycle. Its [`PackageSource`] decides which backend handles an uninstall.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString};

/// `install_date` shown for APT packages.
pub const APT_INSTALL_MARKER: &str = "Manual";

/// `install_date` shown for snaps; `snap list` carries no per-snap timestamp.
pub const SNAP_INSTALL_MARKER: &str = "Installed via Snap";

/// Package manager a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum PackageSource {
    #[strum(serialize = "APT")]
    #[serde(rename = "APT")]
    Apt,
    #[strum(serialize = "Snap")]
    #[serde(rename = "Snap")]
    Snap,
}

/// Which records a listing should show (the All/APT/Snap tabs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SourceFilter {
    #[default]
    All,
    Apt,
    Snap,
}

impl SourceFilter {
    /// Check whether a record from `source` passes this filter
    pub fn admits(self, source: PackageSource) -> bool {
        match self {
            Self::All => true,
            Self::Apt => source == PackageSource::Apt,
            Self::Snap => source == PackageSource::Snap,
        }
    }
}

/// Identity of an installed unit: names only need to be unique per source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageKey {
    pub source: PackageSource,
    pub name: String,
}

impl PackageKey {
    pub fn new(source: PackageSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.source)
    }
}

/// One installed package as reported by a backend.
///
/// Fields are private so a record cannot change after acquisition; in
/// particular its source is fixed for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    name: String,
    version: String,
    description: String,
    icon: Option<PathBuf>,
    #[serde(rename = "type")]
    source: PackageSource,
    install_date: String,
}

impl PackageRecord {
    /// Build an APT record. `install_date` is always [`APT_INSTALL_MARKER`].
    pub fn apt(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        icon: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            icon,
            source: PackageSource::Apt,
            install_date: APT_INSTALL_MARKER.to_string(),
        }
    }

    /// Build a snap record with a description synthesized from its publisher.
    pub fn snap(
        name: impl Into<String>,
        version: impl Into<String>,
        publisher: &str,
        icon: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: format!("Snap from {}", publisher),
            icon,
            source: PackageSource::Snap,
            install_date: SNAP_INSTALL_MARKER.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    pub fn source(&self) -> PackageSource {
        self.source
    }

    pub fn install_date(&self) -> &str {
        &self.install_date
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(self.source, self.name.clone())
    }

    /// Case-insensitive match of `needle` (already lowercased) against name
    /// or description.
    pub fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}
