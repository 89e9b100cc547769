//! `directory` command-line entry point.
//!
//! # Responsibility
//! - Resolve configuration from `.env`, environment and flags.
//! - Dispatch subcommands to the core services and print JSON results.
//!
//! Failures print `{"error_code": ..., "message": ...}` to stderr and exit 1.

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::CliError;
use directory_core::DirectoryConfig;
use log::info;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "directory",
    about = "Organization directory with a depth-bounded activity hierarchy",
    version,
    propagate_version = true
)]
struct Cli {
    /// SQLite database path (overrides DIRECTORY_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error (overrides DIRECTORY_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute log directory; enables file logging (overrides DIRECTORY_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace all data with the demo dataset
    Seed,

    /// Manage the activity hierarchy
    Activity {
        #[command(subcommand)]
        subcommand: ActivityCommand,
    },

    /// Manage buildings
    Building {
        #[command(subcommand)]
        subcommand: BuildingCommand,
    },

    /// Query organizations
    Org {
        #[command(subcommand)]
        subcommand: OrgCommand,
    },
}

#[derive(Subcommand)]
pub(crate) enum ActivityCommand {
    /// Create an activity, as a root unless --parent is given
    Add {
        name: String,
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// Move an activity and its subtree; omit --parent to make it a root
    Move {
        id: Uuid,
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// Delete an activity and all its descendants
    Delete { id: Uuid },
    /// List children of --parent, or roots
    Children {
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// Print one subtree, or the whole forest
    Tree { id: Option<Uuid> },
    /// Print the activity id plus descendant ids used by activity queries
    Scope { id: Uuid },
}

#[derive(Subcommand)]
pub(crate) enum BuildingCommand {
    /// Create a building
    Add {
        address: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// List buildings ordered by address
    List,
}

#[derive(Subcommand)]
pub(crate) enum OrgCommand {
    /// Show one organization
    Get { id: Uuid },
    /// Case-insensitive name search
    Search { query: String },
    /// Organizations located in one building
    Building { id: Uuid },
    /// Organizations linked to an activity or its descendants
    Activity { id: Uuid },
    /// Organizations inside a latitude/longitude rectangle
    Bbox(BboxArgs),
}

#[derive(Args)]
pub(crate) struct BboxArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) min_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) min_lon: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) max_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) max_lon: f64,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("{}", err.to_json());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(&cli)?;
    if let Some(log_dir) = &config.log_dir {
        let log_dir = log_dir.to_string_lossy();
        directory_core::init_logging(config.log_level, &log_dir).map_err(CliError::config)?;
    }

    info!(
        "event=cli_start module=cli status=ok version={} db_path={}",
        directory_core::core_version(),
        config.database_path.display()
    );

    let conn = directory_core::open_db(&config.database_path)?;
    let output = match cli.command {
        Commands::Seed => commands::seed(&conn)?,
        Commands::Activity { subcommand } => commands::activity(&conn, subcommand)?,
        Commands::Building { subcommand } => commands::building(&conn, subcommand)?,
        Commands::Org { subcommand } => commands::org(&conn, subcommand)?,
    };

    let rendered = serde_json::to_string_pretty(&output).map_err(CliError::output)?;
    println!("{rendered}");
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<DirectoryConfig, CliError> {
    let overrides = [
        (
            directory_core::config::DB_PATH_VAR,
            cli.db.as_ref().map(|path| path.to_string_lossy().into_owned()),
        ),
        (directory_core::config::LOG_LEVEL_VAR, cli.log_level.clone()),
        (directory_core::config::LOG_DIR_VAR, cli.log_dir.clone()),
    ];
    DirectoryConfig::from_lookup(|var| {
        overrides
            .iter()
            .find(|(name, _)| *name == var)
            .and_then(|(_, value)| value.clone())
            .or_else(|| std::env::var(var).ok())
    })
    .map_err(|err| CliError::config(err.to_string()))
}
