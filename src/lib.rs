//! pkgtidy library
//!
//! Enumerates user-installed packages from APT and Snap on Debian/Ubuntu
//! systems, separates deliberate APT installs from setup and dependency
//! noise, and removes packages through a privileged helper.

pub mod acquisition;
pub mod apt;
pub mod backend;
pub mod classifier;
pub mod cli;
pub mod command_runner;
pub mod config;
pub mod error;
pub mod icons;
pub mod inventory;
pub mod process_guard;
pub mod session;
pub mod snap;
pub mod types;
pub mod uninstall;

pub use apt::AptBackend;
pub use backend::PackageBackend;
pub use classifier::{ClassificationContext, TimestampSource, Verdict};
pub use command_runner::{CommandOutput, CommandRunner, SystemRunner};
pub use config::{AppConfig, ClassificationPolicy, SnapPolicy, ToolPaths};
pub use error::{PkgTidyError, Result};
pub use icons::IconResolver;
pub use inventory::{Inventory, SourceCounts};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use session::{Session, SessionEvent};
pub use snap::SnapBackend;
pub use types::{PackageKey, PackageRecord, PackageSource, SourceFilter};
pub use uninstall::{UninstallExecutor, UninstallOutcome};
