//! trellis: route cache management
//!
//! ```text
//! trellis routes:cache --manifest routes.toml [--output bootstrap/cache/routes.json]
//! trellis routes:list  --manifest routes.toml | --cache bootstrap/cache/routes.json [--json]
//! trellis routes:clear [--output bootstrap/cache/routes.json]
//! ```
//!
//! Exits 0 on success and 1 on failure.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use trellis_core::{load_config, logging, AppConfig};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Route cache management for trellis applications", long_about = None)]
struct Cli {
    /// Application config (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a route manifest and write the route cache
    #[command(name = "routes:cache")]
    Cache {
        #[arg(short, long)]
        manifest: PathBuf,
        /// Cache file; defaults to routing.cache_path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete the route cache
    #[command(name = "routes:clear")]
    Clear {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the routes of a manifest or a cache file
    #[command(name = "routes:list")]
    List {
        #[arg(short, long, conflicts_with = "cache", required_unless_present = "cache")]
        manifest: Option<PathBuf>,
        #[arg(long)]
        cache: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: {e}");
    }

    let result = match cli.command {
        Commands::Cache { manifest, output } => {
            let output = output.unwrap_or_else(|| config.routing.cache_path.clone());
            commands::cache(&manifest, &output).map(|count| {
                println!("Cached {count} routes to {}", output.display());
            })
        }
        Commands::Clear { output } => {
            let output = output.unwrap_or_else(|| config.routing.cache_path.clone());
            commands::clear(&output).map(|removed| {
                if removed {
                    println!("Removed {}", output.display());
                } else {
                    println!("No route cache at {}", output.display());
                }
            })
        }
        Commands::List {
            manifest,
            cache,
            json,
        } => {
            let source = match (manifest, cache) {
                (Some(manifest), _) => commands::Source::Manifest(manifest),
                (None, Some(cache)) => commands::Source::Cache(cache),
                (None, None) => commands::Source::Cache(config.routing.cache_path.clone()),
            };
            commands::list(&source, json).map(|table| print!("{table}"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
