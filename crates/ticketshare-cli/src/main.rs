//! TicketShare CLI - ticket-authenticated single-file transfer
//!
//! One side hosts a file, the other fetches it by presenting the same ticket.
//!
//! ## Quick Start
//!
//! ```bash
//! # Offer a file
//! ticketshare host ./report.pdf --ticket T1
//!
//! # Fetch it (on another machine)
//! ticketshare receive 192.168.1.20:8080 --ticket T1
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Host(args) => commands::host::run(args).await,
        Command::Receive(args) => commands::receive::run(args).await,
        Command::Config(args) => commands::config::run(&args),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_directives = if verbose {
        "info,ticketshare=debug,ticketshare_core=debug"
    } else {
        "warn,ticketshare=info,ticketshare_core=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
