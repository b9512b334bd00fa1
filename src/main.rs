use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docledger::cli::commands;
use docledger::types::EntryStatus;

#[derive(Parser)]
#[command(name = "docledger")]
#[command(
    version,
    about = "Track documentation coverage of a codebase across many driver runs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl Format {
    fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize docledger in the current directory
    Init {
        #[arg(long, short, help = "Reinitialize an existing project")]
        force: bool,
    },

    /// Extract entities and reconcile them into the manifests
    Scan {
        #[arg(long = "dry-run", help = "Show what would change without writing")]
        dry_run: bool,
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show coverage, run history, gaps and campaign status
    Status {
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
        #[arg(short = 'o', long, help = "Write the JSON report to a file")]
        output: Option<PathBuf>,
    },

    /// List pending entries of a category in discovery order
    Pending {
        category: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List entries of a category with a given status
    List {
        category: String,
        #[arg(short = 's', long, help = "pending, documented, error or manual-review")]
        status: EntryStatus,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Run the configured driver command over pending entries
    Document {
        #[arg(short = 'c', long)]
        category: Option<String>,
        #[arg(short = 'n', long, help = "Maximum number of entries to attempt")]
        limit: Option<usize>,
    },

    /// Record an outcome for a pending entry by hand
    Mark {
        category: String,
        name: String,
        #[arg(help = "Entry location as <file>:<line>")]
        location: String,
        #[arg(help = "documented, error or manual-review")]
        status: EntryStatus,
        #[arg(short = 'r', long)]
        reason: Option<String>,
    },

    /// Return an error or manual-review entry to pending
    Requeue {
        category: String,
        name: String,
        location: String,
    },

    /// Delete an entry from its manifest
    Remove {
        category: String,
        name: String,
        location: String,
    },

    /// Move an entry to a new name or location, keeping its status
    Rename {
        category: String,
        name: String,
        location: String,
        #[arg(long = "to-name")]
        to_name: Option<String>,
        #[arg(long = "to-location")]
        to_location: Option<String>,
    },

    /// Show the recorded status transitions of an entry
    Events {
        category: String,
        name: String,
        location: String,
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List unresolved gaps, or the full gap log
    Gaps {
        #[arg(long, help = "Show the whole append-only gap log")]
        all: bool,
        #[arg(short = 'c', long)]
        category: Option<String>,
        #[arg(long, help = "Only records from this verification run")]
        run: Option<u64>,
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show verification run history
    History {
        #[arg(short = 'n', long, help = "Only the most recent runs")]
        limit: Option<usize>,
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Export, import or fingerprint a category manifest
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Write a manifest as a checklist file
    Export {
        category: String,
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Merge a checklist file into the ledger
    Import { path: PathBuf },
    /// Print the content hash of a manifest
    Digest { category: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mdocledger encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Scan { dry_run, format } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::scan::run(dry_run, format.as_str()))?;
        }
        Commands::Status { format, output } => {
            commands::status::run(format.as_str(), output.as_deref())?
        }
        Commands::Pending {
            category,
            limit,
            format,
        } => commands::entries::list(&category, EntryStatus::Pending, limit, format.as_str())?,
        Commands::List {
            category,
            status,
            limit,
            format,
        } => commands::entries::list(&category, status, limit, format.as_str())?,
        Commands::Document { category, limit } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::document::run(category.as_deref(), limit))?;
        }
        Commands::Mark {
            category,
            name,
            location,
            status,
            reason,
        } => commands::entries::mark(&category, &name, &location, status, reason)?,
        Commands::Requeue {
            category,
            name,
            location,
        } => commands::entries::requeue(&category, &name, &location)?,
        Commands::Remove {
            category,
            name,
            location,
        } => commands::entries::remove(&category, &name, &location)?,
        Commands::Rename {
            category,
            name,
            location,
            to_name,
            to_location,
        } => commands::entries::rename(
            &category,
            &name,
            &location,
            to_name.as_deref(),
            to_location.as_deref(),
        )?,
        Commands::Events {
            category,
            name,
            location,
            format,
        } => commands::entries::events(&category, &name, &location, format.as_str())?,
        Commands::Gaps {
            all,
            category,
            run,
            format,
        } => commands::gaps::run(all, category.as_deref(), run, format.as_str())?,
        Commands::History { limit, format } => commands::history::run(limit, format.as_str())?,
        Commands::Manifest { action } => match action {
            ManifestAction::Export { category, output } => {
                commands::manifest::export(&category, output.as_deref())?
            }
            ManifestAction::Import { path } => commands::manifest::import(&path)?,
            ManifestAction::Digest { category } => commands::manifest::digest(&category)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                commands::config::show(global, format.as_str())?
            }
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
