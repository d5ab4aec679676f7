use crate::error::Result;
use crate::types::{PackageRecord, PackageSource};
use std::path::PathBuf;
use tracing::info;

/// A package manager pkgtidy can enumerate.
///
/// Implementations must be cheap to share across worker threads; all state
/// they need is read-only after construction.
pub trait PackageBackend: Send + Sync {
    fn source(&self) -> PackageSource;

    /// Fast precondition gate: is the tool installed at all?
    fn is_available(&self) -> bool;

    /// Enumerate the user's packages from this source
    fn list_packages(&self) -> Result<Vec<PackageRecord>>;

    fn find_icon(&self, name: &str) -> Option<PathBuf>;

    /// One acquisition run. A missing tool is an empty list, not an error.
    fn acquire(&self) -> Result<Vec<PackageRecord>> {
        if !self.is_available() {
            info!(source = %self.source(), "tool not installed, nothing to list");
            return Ok(Vec::new());
        }
        let packages = self.list_packages()?;
        info!(source = %self.source(), count = packages.len(), "acquired packages");
        Ok(packages)
    }
}
