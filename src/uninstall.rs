//! Privileged package removal.
//!
//! The command is chosen by the record's source:
//!
//! - APT: `pkexec apt-get remove --purge -y <name>`
//! - Snap: `pkexec snap remove <name>`
//!
//! Exit status zero is the only success. A denied authorization prompt is
//! just a non-zero exit and comes back as an ordinary failure message.

use crate::command_runner::{describe, CommandRunner};
use crate::config::ToolPaths;
use crate::error::PkgTidyError;
use crate::types::PackageSource;
use std::sync::Arc;
use tracing::{info, warn};

/// Failure message when the tool exits non-zero without writing to stderr
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Success or failure of one removal, with the text to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    pub success: bool,
    pub message: String,
}

impl From<Result<String, String>> for UninstallOutcome {
    fn from(result: Result<String, String>) -> Self {
        match result {
            Ok(message) => Self {
                success: true,
                message,
            },
            Err(message) => Self {
                success: false,
                message,
            },
        }
    }
}

pub struct UninstallExecutor {
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
    dry_run: bool,
}

impl UninstallExecutor {
    pub fn new(tools: ToolPaths, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            tools,
            dry_run: false,
        }
    }

    /// Report what would run instead of running it
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Program and arguments that remove `name` from `source`
    pub fn removal_command(&self, name: &str, source: PackageSource) -> (String, Vec<String>) {
        let mut args = Vec::new();
        match source {
            PackageSource::Apt => {
                args.push(self.tools.apt_get.clone());
                args.extend(["remove", "--purge", "-y"].map(String::from));
            }
            PackageSource::Snap => {
                args.push(self.tools.snap.clone());
                args.push("remove".to_string());
            }
        }
        args.push(name.to_string());
        (self.tools.privilege_wrapper.clone(), args)
    }

    /// Remove one package. `Ok` carries the success message, `Err` the
    /// diagnostic to show the user.
    pub fn uninstall(&self, name: &str, source: PackageSource) -> Result<String, String> {
        validate_package_name(name).map_err(|e| e.to_string())?;

        let (program, args) = self.removal_command(name, source);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = describe(&program, &arg_refs);

        if self.dry_run {
            info!(%command, "dry run, not removing");
            return Ok(format!("[DRY RUN] Would run: {}", command));
        }

        info!(%command, "removing package");
        let output = self
            .runner
            .run(&program, &arg_refs)
            .map_err(|e| e.to_string())?;

        if output.success {
            info!(package = name, %source, "removed");
            Ok(format!("Successfully uninstalled {}", name))
        } else {
            warn!(package = name, %source, code = ?output.exit_code, "removal failed");
            let detail = output.stderr.trim_end();
            if detail.trim_start().is_empty() {
                Err(UNKNOWN_ERROR.to_string())
            } else {
                Err(detail.to_string())
            }
        }
    }
}

/// Reject names that could be read as an option or carry shell syntax.
/// Debian and snap names only use `[a-z0-9.+-]`; `:` allows an arch qualifier.
pub fn validate_package_name(name: &str) -> Result<(), PkgTidyError> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | ':' | '_'));
    if valid {
        Ok(())
    } else {
        Err(PkgTidyError::InvalidPackageName(name.to_string()))
    }
}
