//! FeedSync CLI
//!
//! Command-line tools for FeedSync replicas stored as JSON snapshots.
//!
//! # Commands
//!
//! - `add` - Create an item, creating the replica file when needed
//! - `inspect` - Display the items of a replica
//! - `conflicts` - List items in conflict and the versions they beat
//! - `resolve` - Resolve the conflicts of one item
//! - `purge` - Drop redundant history entries
//! - `sync` - Synchronize two replicas

mod commands;
mod error;
mod snapshot;

use clap::{Parser, Subcommand};
use commands::inspect::OutputFormat;
use commands::sync::Direction;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// FeedSync command-line replica tools.
#[derive(Parser)]
#[command(name = "feedsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an item
    Add {
        /// Replica snapshot file
        file: PathBuf,

        /// Item title
        #[arg(short, long)]
        title: String,

        /// Item summary
        #[arg(short, long, default_value = "")]
        summary: String,

        /// Item payload
        #[arg(short, long)]
        payload: Option<String>,

        /// Author of the edit, required when the file does not exist yet
        #[arg(short, long)]
        by: Option<String>,
    },

    /// Display the items of a replica
    Inspect {
        /// Replica snapshot file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List items in conflict
    Conflicts {
        /// Replica snapshot file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Resolve the conflicts of one item, keeping the winning version
    Resolve {
        /// Replica snapshot file
        file: PathBuf,

        /// Item id
        id: String,

        /// Delete the item as part of the resolution
        #[arg(short, long)]
        delete: bool,
    },

    /// Drop history entries superseded by the same author
    Purge {
        /// Replica snapshot file
        file: PathBuf,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Synchronize two replicas
    Sync {
        /// Left replica snapshot file
        left: PathBuf,

        /// Right replica snapshot file
        right: PathBuf,

        /// Only exchange items changed at or after this RFC 3339 instant
        #[arg(short, long)]
        since: Option<String>,

        /// Directions to exchange items in
        #[arg(short, long, value_enum, default_value = "send-receive")]
        direction: Direction,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Add {
            file,
            title,
            summary,
            payload,
            by,
        } => {
            commands::add::run(&file, &title, &summary, payload.as_deref(), by.as_deref())?;
        }
        Commands::Inspect { file, format } => {
            commands::inspect::run(&file, format)?;
        }
        Commands::Conflicts { file, format } => {
            commands::conflicts::run(&file, format)?;
        }
        Commands::Resolve { file, id, delete } => {
            commands::resolve::run(&file, &id, delete)?;
        }
        Commands::Purge { file, dry_run } => {
            commands::purge::run(&file, dry_run)?;
        }
        Commands::Sync {
            left,
            right,
            since,
            direction,
        } => {
            commands::sync::run(&left, &right, since.as_deref(), direction)?;
        }
    }

    Ok(())
}
