//! Command line and environment configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{OwnerId, RawCandidate};

/// Pantry inventory tracker - owner-scoped perishable goods with an audit trail
#[derive(Parser, Debug)]
#[command(name = "pantry_tracker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(short, long, env = "PANTRY_DATABASE", default_value_t = default_db_path())]
    pub database: String,

    /// Owner id of the signed-in user (CLI commands only)
    #[arg(short, long, env = "PANTRY_OWNER")]
    pub owner: Option<String>,

    /// How long a store round-trip may wait on a locked database, in milliseconds
    #[arg(long, env = "PANTRY_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Extra attempts for read operations when the database is busy
    #[arg(long, env = "PANTRY_READ_RETRIES", default_value_t = 3)]
    pub read_retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add an item; merges into an existing one with the same name, expiry and category
    Add(ItemArgs),
    /// Overwrite an item's name, quantity, expiry and category
    Edit {
        /// Item id as shown by `list`
        id: i64,
        #[command(flatten)]
        item: ItemArgs,
    },
    /// Delete an item
    Delete {
        /// Item id as shown by `list`
        id: i64,
    },
    /// List items with their expiry status
    List {
        /// Case-insensitive name filter
        #[arg(short, long, default_value = "")]
        search: String,
        /// Only show this category
        #[arg(short, long)]
        category: Option<String>,
        /// Sort by name, quantity or expiryDate
        #[arg(long, default_value = "name")]
        sort: String,
    },
    /// Show the change history, newest first
    History,
    /// Print the known categories
    Categories,
    /// Run the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PANTRY_WEB_PORT", default_value_t = 8080)]
        port: u16,
        /// Address to bind
        #[arg(long, env = "PANTRY_BIND", default_value = "0.0.0.0")]
        bind: String,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ItemArgs {
    /// Item name
    pub name: String,
    /// Quantity (whole number, 0 or more)
    #[arg(short, long)]
    pub quantity: String,
    /// Expiry date (YYYY-MM-DD)
    #[arg(short, long)]
    pub expiry: String,
    /// Category
    #[arg(short, long)]
    pub category: String,
}

impl From<ItemArgs> for RawCandidate {
    fn from(args: ItemArgs) -> Self {
        RawCandidate {
            name: args.name,
            quantity: args.quantity,
            expiry_date: args.expiry,
            category: args.category,
        }
    }
}

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub owner: Option<OwnerId>,
    pub busy_timeout: Duration,
    pub read_retries: u32,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            database: PathBuf::from(&cli.database),
            owner: cli.owner.as_deref().and_then(OwnerId::new),
            busy_timeout: Duration::from_millis(cli.busy_timeout_ms),
            read_retries: cli.read_retries,
        }
    }
}

/// Returns the default database path: ~/.local/share/pantry_tracker/pantry.db
pub fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pantry_tracker")
        .join("pantry.db")
        .to_string_lossy()
        .to_string()
}
