//! npmmvn command-line tool
//!
//! Mirrors a project's node_modules tree into a Maven repository (`deploy`)
//! and rebuilds it from there (`restore`).

mod commands;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use output::StyledOutput;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "npmmvn")]
#[command(about = "Store node_modules in a Maven repository and restore it", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Repository base URL, overriding NPMMVN_REPOSITORY, package.json and config
    #[arg(long, global = true)]
    repository: Option<String>,

    /// Also log per-package checks and packing
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, value_parser = ["auto", "always", "never"])]
    color: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish missing packages and write .npmmvn.json
    Deploy {
        /// Compare artifacts that already exist with the local package
        #[arg(long)]
        verify_existing: bool,
    },

    /// Fetch the packages listed in .npmmvn.json that are missing locally
    Restore {
        /// Skip the rebuild step after fetching
        #[arg(long)]
        no_rebuild: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut out = StyledOutput::new(output::resolve_color_choice(cli.color.as_deref()));

    let result = match cli.command {
        Commands::Deploy { verify_existing } => {
            commands::deploy::execute(&mut out, cli.project_dir, cli.repository, verify_existing).await
        }
        Commands::Restore { no_rebuild } => {
            commands::restore::execute(&mut out, cli.project_dir, cli.repository, !no_rebuild).await
        }
    };

    if let Err(e) = result {
        out.stderr_error(&format!("Error: {}\n", e));
        std::process::exit(1);
    }
}
