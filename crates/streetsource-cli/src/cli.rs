use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "streetsource",
    about = "StreetSource — supplier trust ledger for street-food vendors",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./streetsource.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the ledger data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the ledger owner (`account:<name>` or hex id)
    #[arg(long, global = true)]
    pub owner: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a configuration file
    Init(InitArgs),
    /// Show the caller id derived from an account name
    Identity(IdentityArgs),
    /// Register a new supplier
    Register(RegisterArgs),
    /// Rate a supplier
    Rate(RateArgs),
    /// Mark a supplier as verified (owner only)
    Verify(PrivilegedArgs),
    /// Clear a supplier's verification (owner only)
    Unverify(PrivilegedArgs),
    /// List suppliers in registration order
    Suppliers(SuppliersArgs),
    /// Show one supplier
    Show(SupplierArgs),
    /// List a supplier's reviews
    Reviews(SupplierArgs),
    /// Show platform statistics
    Stats,
    /// List suppliers rated by an account
    MyRatings(CallerArgs),
    /// Print journaled events
    Events(EventsArgs),
    /// Check journal integrity
    Check,
    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Owner account name
    #[arg(long = "owner-account")]
    pub owner_account: String,
    #[arg(long, default_value = "streetsource.toml")]
    pub path: PathBuf,
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct IdentityArgs {
    pub account: String,
}

#[derive(Args)]
pub struct CallerArgs {
    /// Account acting or queried
    #[arg(long = "as", value_name = "ACCOUNT")]
    pub account: String,
}

#[derive(Args)]
pub struct RegisterArgs {
    pub name: String,
    #[arg(short, long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "")]
    pub contact: String,
    #[command(flatten)]
    pub caller: CallerArgs,
}

#[derive(Args)]
pub struct RateArgs {
    pub supplier: String,
    pub score: u8,
    #[arg(short = 'm', long)]
    pub comment: String,
    #[command(flatten)]
    pub caller: CallerArgs,
}

#[derive(Args)]
pub struct PrivilegedArgs {
    pub supplier: String,
    #[command(flatten)]
    pub caller: CallerArgs,
}

#[derive(Args)]
pub struct SuppliersArgs {
    /// Include verification and rating columns
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args)]
pub struct SupplierArgs {
    pub name: String,
}

#[derive(Args)]
pub struct EventsArgs {
    /// Only events with a greater sequence number
    #[arg(long, default_value = "0")]
    pub since: u64,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}
