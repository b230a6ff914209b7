//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod build;
mod helpers;
mod init;
mod query;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gini_census::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "gini")]
#[command(about = "Census Gini index acquisition and lookup")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directories and database schema
    Init,

    /// List the archive files published at the source
    List,

    /// Download, extract and load every published archive
    Run {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load local spreadsheet files without touching the network
    Build {
        /// Spreadsheet files (.xls, .xlsx, .ods, .csv), processed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a lookup (scope=name[,type=single|all]) or raw SQL
    Query {
        /// Lookup expression or SQL statement
        expr: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read expressions from stdin until exit, quit or end of input
    Shell,

    /// Show row counts of the stored tables
    Status,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (settings, _config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::List => scrape::cmd_list(&settings).await,
        Commands::Run { json } => scrape::cmd_run(&settings, json).await,
        Commands::Build { files } => build::cmd_build(&settings, &files).await,
        Commands::Query { expr, json } => query::cmd_query(&settings, &expr, json).await,
        Commands::Shell => query::cmd_shell(&settings).await,
        Commands::Status => query::cmd_status(&settings).await,
    }
}
