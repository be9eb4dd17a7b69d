//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod config;
pub mod host;
pub mod receive;

/// Load configuration with graceful fallback to defaults.
///
/// A config file that exists but cannot be parsed is reported and ignored.
pub fn load_config() -> ticketshare_core::config::Config {
    ticketshare_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration file: {}", e);
        ticketshare_core::config::Config::default()
    })
}

/// TicketShare - ticket-authenticated single-file transfer
#[derive(Parser)]
#[command(name = "ticketshare")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Offer a file to receivers holding the ticket
    Host(HostArgs),

    /// Fetch a file from a host
    Receive(ReceiveArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the host command
#[derive(Parser)]
pub struct HostArgs {
    /// File to offer
    pub file: PathBuf,

    /// Ticket receivers must present
    #[arg(short, long, env = "TICKETSHARE_TICKET")]
    pub ticket: String,

    /// Address to listen on (defaults to the configured bind address)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Exit after the first successful transfer
    #[arg(long)]
    pub once: bool,

    /// Data chunk size in bytes (at most 1 MiB)
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

/// Arguments for the receive command
#[derive(Parser)]
pub struct ReceiveArgs {
    /// Host address (IP or IP:PORT)
    pub addr: String,

    /// Ticket to present
    #[arg(short, long, env = "TICKETSHARE_TICKET")]
    pub ticket: String,

    /// Output directory for the received file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Write the default configuration file
    Reset,
}
