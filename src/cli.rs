use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{PackageSource, SourceFilter};

/// pkgtidy - find the packages you installed yourself, and remove them
#[derive(Parser, Debug)]
#[command(name = "pkgtidy")]
#[command(about = "List manually installed APT and Snap packages and uninstall them")]
#[command(version)]
pub struct Cli {
    /// Path to a JSON configuration file (pattern lists, tools, timeouts)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dry-run mode: show removal commands without running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List user-installed packages from APT and Snap
    List {
        /// Which source to show (all, apt, snap)
        #[arg(short, long, default_value = "all")]
        source: SourceFilter,
        /// Only show packages whose name or description contains this text
        #[arg(short = 'q', long)]
        search: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show why each manually marked APT package was kept or dropped
    Explain {
        /// Restrict the report to these packages
        names: Vec<String>,
    },
    /// Uninstall one package (asks for authorization through pkexec)
    Uninstall {
        /// Package name
        name: String,
        /// Package source (apt or snap)
        #[arg(short, long)]
        source: PackageSource,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
        /// Remove even if the package is not in the user-installed list
        #[arg(long)]
        force: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Print the built-in configuration as JSON
    DefaultConfig,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
