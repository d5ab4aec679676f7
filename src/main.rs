//! pkgtidy - command-line front end
//!
//! Drives a [`Session`] and renders its events: one line per backend as it
//! finishes, then the filtered package table.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pkgtidy::cli::{Cli, Commands};
use pkgtidy::session::unlisted_message;
use pkgtidy::{
    process_guard, AppConfig, AptBackend, CommandRunner, Inventory, PackageBackend, PackageRecord,
    PackageSource, ProcessGuard, Session, SessionEvent, SourceFilter, SystemRunner,
};

const DESCRIPTION_WIDTH: usize = 60;

/// Initialize the tracing subscriber; RUST_LOG wins over `--verbose`
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    info!("pkgtidy starting up");

    if let Err(e) = process_guard::init_signal_handlers() {
        tracing::warn!("Failed to initialize signal handlers: {}", e);
    }
    let _guard = ProcessGuard::new();

    let command = cli.command.unwrap_or(Commands::List {
        source: SourceFilter::All,
        search: None,
        json: false,
    });

    match command {
        Commands::Validate { config } => run_validate(&config),
        Commands::DefaultConfig => {
            println!("{}", AppConfig::default().to_json()?);
            Ok(())
        }
        Commands::List {
            source,
            search,
            json,
        } => {
            let config = AppConfig::load_or_default(cli.config.as_deref())?;
            run_list(&config, source, search.as_deref().unwrap_or(""), json)
        }
        Commands::Explain { names } => {
            let config = AppConfig::load_or_default(cli.config.as_deref())?;
            run_explain(&config, &names)
        }
        Commands::Uninstall {
            name,
            source,
            yes,
            force,
        } => {
            let config = AppConfig::load_or_default(cli.config.as_deref())?;
            let options = UninstallOptions {
                yes,
                force,
                dry_run: cli.dry_run,
            };
            run_uninstall(&config, &name, source, options)
        }
    }
}

fn run_validate(path: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", path);
    match AppConfig::load_from_file(path).and_then(|config| config.validate()) {
        Ok(()) => {
            println!("✓ Configuration file is valid: {}", path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run_list(config: &AppConfig, filter: SourceFilter, search: &str, json: bool) -> Result<()> {
    let mut session = Session::from_config(config, false);
    session.start_acquisition();

    session.run_until_idle(|event, inventory| match event {
        SessionEvent::PackagesLoaded { source, packages } => {
            let counts = inventory.counts();
            eprintln!(
                "✓ {}: {} package(s)   [All ({}) · APT ({}) · Snap ({})]",
                source,
                packages.len(),
                counts.all,
                counts.apt,
                counts.snap
            );
        }
        SessionEvent::AcquisitionFailed { source, reason } => {
            eprintln!("✗ {}: {}", source, reason);
        }
        SessionEvent::UninstallCompleted { .. } => {}
    });

    let inventory = session.inventory();
    let rows = inventory.filtered(filter, search);

    if json {
        let out = serde_json::to_string_pretty(&rows).context("Failed to serialize packages")?;
        println!("{}", out);
    } else {
        print_table(&rows, inventory);
    }
    Ok(())
}

fn print_table(rows: &[&PackageRecord], inventory: &Inventory) {
    if rows.is_empty() {
        println!("No packages found.");
        return;
    }

    let name_width = rows.iter().map(|r| r.name().len()).max().unwrap_or(4).max(4);
    let version_width = rows.iter().map(|r| r.version().len()).max().unwrap_or(7).max(7);

    println!(
        "{:<name_width$}  {:<version_width$}  {:<4}  DESCRIPTION",
        "NAME", "VERSION", "TYPE"
    );
    for record in rows {
        println!(
            "{:<name_width$}  {:<version_width$}  {:<4}  {}",
            record.name(),
            record.version(),
            record.source(),
            truncate(record.description(), DESCRIPTION_WIDTH)
        );
    }

    let counts = inventory.counts();
    println!();
    println!(
        "Showing {} of {}  (APT {}, Snap {})",
        rows.len(),
        counts.all,
        counts.apt,
        counts.snap
    );
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn run_explain(config: &AppConfig, names: &[String]) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::queries(config.query_timeout()));
    let apt = AptBackend::new(config, runner);

    if !apt.is_available() {
        println!("APT is not installed ({}).", config.tools.apt_binary.display());
        return Ok(());
    }

    let reference = apt.system_reference_timestamp();
    println!(
        "System reference: {} = {}{}",
        apt.policy().sentinel_package,
        reference,
        if reference == 0 { " (unknown, date filter open)" } else { "" }
    );

    let verdicts = apt.explain(names).context("Failed to read manual package marks")?;
    if verdicts.is_empty() {
        println!("No matching manually marked packages.");
        return Ok(());
    }
    let width = verdicts.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, verdict) in &verdicts {
        let mark = if verdict.is_accepted() { "✓" } else { "·" };
        println!("{} {:<width$}  {}", mark, name, verdict);
    }
    let kept = verdicts.iter().filter(|(_, v)| v.is_accepted()).count();
    println!();
    println!("{} of {} kept", kept, verdicts.len());
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

struct UninstallOptions {
    yes: bool,
    force: bool,
    dry_run: bool,
}

fn run_uninstall(
    config: &AppConfig,
    name: &str,
    source: PackageSource,
    options: UninstallOptions,
) -> Result<()> {
    let mut session = Session::from_config(config, options.dry_run);

    if !options.force {
        // Only packages the classifier lists may be removed
        session.start_acquisition();
        session.run_until_idle(|event, _| {
            if let SessionEvent::AcquisitionFailed { source, reason } = event {
                eprintln!("✗ {}: {}", source, reason);
            }
        });
        if session.inventory().get(source, name).is_none() {
            eprintln!("✗ {}", unlisted_message(name, source));
            eprintln!("  Use --force to remove it anyway.");
            std::process::exit(1);
        }
    }

    if !options.yes && !options.dry_run {
        let prompt = format!("Are you sure you want to uninstall {} ({})?", name, source);
        if !confirm(&prompt)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if options.force {
        session.force_uninstall(name, source);
    } else {
        session.start_uninstall(name, source);
    }

    let mut failed = false;
    session.run_until_idle(|event, _| {
        if let SessionEvent::UninstallCompleted {
            success, message, ..
        } = event
        {
            debug!(success, "uninstall finished");
            if *success {
                println!("✓ {}", message.trim_end());
            } else {
                eprintln!("✗ {}", message.trim_end());
                failed = true;
            }
        }
    });

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
