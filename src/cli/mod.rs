pub mod handler;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use handler::run;

#[derive(Parser)]
#[command(name = "qb-cli")]
#[command(about = "A CLI tool for QuickBooks online and desktop data services")]
pub struct Cli {
    /// Client configuration file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Credential store file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Credential owner to act as
    #[arg(long, global = true, default_value = "default")]
    pub owner: String,

    /// Output format
    #[arg(long, global = true, default_value = "json")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Credential management
    #[command(subcommand)]
    Credentials(CredentialCommands),
    /// Fetch one object by id
    Get { object_type: String, id: String },
    /// List every object of a type
    Read { object_type: String },
    /// Exact-match search, e.g. `search Customer Name=Acme`
    Search {
        object_type: String,
        #[arg(value_parser = parse_predicate)]
        predicates: Vec<(String, String)>,
    },
    /// Create an object from a JSON file
    Create(ObjectArgs),
    /// Update an object from a JSON file (must include Id)
    Update(ObjectArgs),
    /// Delete the object described by a JSON file (must include Id)
    Delete(ObjectArgs),
    /// Run a raw v3 query statement
    Query { statement: String },
    /// Print the app-center menu markup
    AppMenu,
    /// Disconnect the tenant and drop its credential
    Disconnect,
}

#[derive(Subcommand)]
pub enum CredentialCommands {
    /// Store a tenant credential
    Add {
        #[arg(long)]
        access_key: String,
        #[arg(long)]
        access_secret: String,
        #[arg(long)]
        tenant: String,
        /// Data source tag: QBO or QBD
        #[arg(long, default_value = "QBO")]
        backend: String,
        /// Protocol tag: legacy, wrapped or v3
        #[arg(long, default_value = "v3")]
        protocol: String,
    },
    /// Remove the stored credential
    Remove,
    /// List owners with stored credentials
    List,
}

#[derive(Args)]
pub struct ObjectArgs {
    pub object_type: String,
    /// JSON file holding the object fields
    #[arg(short, long)]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact JSON, for piping
    JsonCompact,
}

fn parse_predicate(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(field, expected)| (field.trim().to_string(), expected.to_string()))
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| format!("expected field=value, got '{}'", value))
}
