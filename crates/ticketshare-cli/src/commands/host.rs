//! Host command implementation.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use ticketshare_core::file::format_size;
use ticketshare_core::Host;

use super::HostArgs;

const PEER_REFRESH: Duration = Duration::from_millis(500);

/// Run the host command.
pub async fn run(args: HostArgs) -> Result<()> {
    let global_config = super::load_config();

    let mut config = global_config.host_config(args.ticket.as_str(), &args.file);
    if let Some(chunk_size) = args.chunk_size {
        config = config.with_chunk_size(chunk_size);
    }
    if args.once {
        config = config.with_max_transfers(Some(1));
    }

    let host = Host::new(config)?;
    let bind = args.bind.unwrap_or(global_config.host.bind);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to listen on {bind}"))?;
    let local_addr = listener.local_addr()?;

    println!();
    println!("TicketShare v{}", ticketshare_core::VERSION);
    println!("{}", "-".repeat(37));
    println!();
    println!(
        "  Offering {} ({})",
        host.offered().name,
        format_size(host.offered().size)
    );
    println!("  Listening on {}", local_addr);
    if args.once {
        println!("  Exiting after the first completed transfer");
    } else {
        println!("  Press Ctrl+C to stop");
    }
    println!();

    let shutdown = CancellationToken::new();
    let abort = CancellationToken::new();
    {
        let (shutdown, abort) = (shutdown.clone(), abort.clone());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            println!();
            println!("  Stopping, waiting for active transfers (Ctrl+C again to abort)");
            shutdown.cancel();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Aborting active transfers");
                abort.cancel();
            }
        });
    }

    let display_stop = CancellationToken::new();
    let display = tokio::spawn(display_peers(host.clone(), display_stop.clone()));

    let completed = host.serve_until(listener, shutdown, abort).await;

    display_stop.cancel();
    let _ = display.await;

    println!();
    println!("  {} transfer(s) completed", completed);

    Ok(())
}

async fn display_peers(host: Host, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(PEER_REFRESH);
    let mut line_open = false;

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let peers = host.registry().snapshot();
        if peers.is_empty() {
            if line_open {
                println!();
                line_open = false;
            }
            continue;
        }

        let status: Vec<String> = peers
            .iter()
            .map(|peer| {
                let progress = peer.progress();
                format!(
                    "{} [{:>6.2}%] {}/s",
                    peer.remote,
                    progress.percentage(),
                    format_size(progress.speed_bps)
                )
            })
            .collect();

        print!("\r  Sending: {}    ", status.join(" | "));
        let _ = io::stdout().flush();
        line_open = true;
    }

    if line_open {
        println!();
    }
}
