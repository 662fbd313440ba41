//! arxgraph CLI - Command-line interface for the AUTOSAR graph extractor
//!
//! Turns ARXML-derived element trees into a typed property graph and keeps
//! it in a local DuckDB database.

use anyhow::Result;
use arxgraph_core::VirtualPolicy;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Parse a virtual node policy name
fn parse_policy(s: &str) -> Result<VirtualPolicy, String> {
    match s.to_lowercase().as_str() {
        "reuse-real" | "reuse" => Ok(VirtualPolicy::ReuseReal),
        "shadow" => Ok(VirtualPolicy::Shadow),
        _ => Err(format!(
            "unknown virtual policy '{}', expected 'reuse-real' or 'shadow'",
            s
        )),
    }
}

mod commands;
mod config;
mod input;
mod output;

use commands::*;
use config::ArxConfig;
use output::OutputFormat;

/// Structural graph extraction for AUTOSAR models.
///
/// arxgraph reads ARXML documents converted to JSON, extracts every
/// identified element as a node, resolves path references across all
/// documents, and replaces the stored graph with the result.
#[derive(Parser)]
#[command(name = "arxgraph")]
#[command(author, version)]
#[command(about = "Structural graph extraction for AUTOSAR models")]
#[command(propagate_version = true)]
#[command(after_help = "Examples:
  arxgraph import models/            Replace the graph with every .json in models/
  arxgraph extract a.json b.json     Show what an import would write
  arxgraph stats                     Summarize the stored graph
  arxgraph export -o graph.json      Dump the stored graph")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format (overrides config default)
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Fail on .arxgraph.toml errors instead of silently using defaults
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract documents and replace the stored graph
    #[command(visible_alias = "i")]
    Import {
        /// Input documents or directories of .json documents
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Database file (default: .arxgraph/graph.duckdb)
        #[arg(long, env = "ARXGRAPH_DB")]
        db: Option<PathBuf>,

        /// How unresolved targets become virtual nodes: reuse-real, shadow
        #[arg(long, value_parser = parse_policy)]
        virtual_policy: Option<VirtualPolicy>,
    },

    /// Extract and resolve documents without touching the database
    #[command(visible_alias = "x")]
    Extract {
        /// Input documents or directories of .json documents
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// How unresolved targets become virtual nodes: reuse-real, shadow
        #[arg(long, value_parser = parse_policy)]
        virtual_policy: Option<VirtualPolicy>,
    },

    /// Show statistics for the stored graph
    #[command(visible_alias = "st")]
    Stats {
        /// Database file (default: .arxgraph/graph.duckdb)
        #[arg(long, env = "ARXGRAPH_DB")]
        db: Option<PathBuf>,
    },

    /// Write the stored graph as JSON
    Export {
        /// Database file (default: .arxgraph/graph.duckdb)
        #[arg(long, env = "ARXGRAPH_DB")]
        db: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Load configuration from .arxgraph.toml
    let root = std::path::Path::new(".");
    let config = if cli.strict {
        ArxConfig::load_strict(root)?
    } else {
        ArxConfig::load(root)
    };

    // Resolve output format: CLI flag > config default > Table
    let format = cli.format.unwrap_or_else(|| {
        config
            .default_format()
            .and_then(|f| f.parse().ok())
            .unwrap_or(OutputFormat::Table)
    });

    // Apply color override from config if set
    if let Some(use_color) = config.use_color() {
        colored::control::set_override(use_color);
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            println!();
            return Ok(());
        }
    };

    match command {
        Commands::Import {
            inputs,
            db,
            virtual_policy,
        } => import::run(&inputs, db.as_deref(), virtual_policy, config, format).await,
        Commands::Extract {
            inputs,
            virtual_policy,
        } => extract::run(&inputs, virtual_policy, config, format),
        Commands::Stats { db } => stats::run(db.as_deref(), &config, format),
        Commands::Export { db, output } => export::run(db.as_deref(), output, &config),
    }
}
