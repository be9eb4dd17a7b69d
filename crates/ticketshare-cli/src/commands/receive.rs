//! Receive command implementation.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::sync::watch;

use ticketshare_core::connection::{configure_tcp_keepalive, parse_host_address};
use ticketshare_core::file::format_size;
use ticketshare_core::{ReceivedFile, Receiver, SessionPhase, TransferProgress};

use super::ReceiveArgs;

/// Run the receive command.
pub async fn run(args: ReceiveArgs) -> Result<()> {
    let global_config = super::load_config();

    let mut config = global_config.receive_config(args.ticket.as_str());
    if let Some(output) = &args.output {
        config = config.with_output_dir(output);
    }

    let addr = parse_host_address(&args.addr)?;
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    if let Err(e) = configure_tcp_keepalive(&stream) {
        tracing::debug!("Failed to enable keepalive: {}", e);
    }

    if !args.quiet && !args.json {
        println!();
        println!("  Connected to {}", addr);
    }

    let receiver = Receiver::new(config);
    let progress_handle = (!args.quiet && !args.json)
        .then(|| tokio::spawn(display_progress(receiver.progress())));

    let result = receiver.receive(stream).await;

    // The progress task only ends once the receiver is gone.
    drop(receiver);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    let received = result?;
    print_summary(&received, &args)?;
    Ok(())
}

fn print_summary(received: &ReceivedFile, args: &ReceiveArgs) -> Result<()> {
    if args.json {
        let output = serde_json::json!({
            "path": received.path.display().to_string(),
            "file_name": received.file_name,
            "declared_size": received.declared_size,
            "bytes_received": received.bytes_received,
            "sha256": received.sha256_hex(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if args.quiet {
        println!("{}", received.path.display());
        return Ok(());
    }

    println!();
    println!(
        "  Saved {} ({})",
        received.path.display(),
        format_size(received.bytes_received)
    );
    println!("  SHA-256: {}", received.sha256_hex());
    if !received.size_matches() {
        println!(
            "  Warning: host announced {} but sent {}",
            format_size(received.declared_size),
            format_size(received.bytes_received)
        );
    }
    println!();

    Ok(())
}

async fn display_progress(mut rx: watch::Receiver<TransferProgress>) {
    let mut last_phase = SessionPhase::Handshaking;

    while rx.changed().await.is_ok() {
        let progress = rx.borrow_and_update().clone();

        if progress.phase != last_phase {
            last_phase = progress.phase;

            match progress.phase {
                SessionPhase::Transferring => {
                    println!(
                        "  Receiving {} ({})",
                        progress.file_name,
                        format_size(progress.total_bytes)
                    );
                }
                SessionPhase::Done => break,
                SessionPhase::Failed => {
                    println!("  Transfer failed.");
                    break;
                }
                SessionPhase::Handshaking
                | SessionPhase::SendingInfo
                | SessionPhase::ReceivingInfo => {}
            }
        }

        if progress.phase == SessionPhase::Transferring {
            let eta = progress
                .eta
                .map_or_else(|| "--".to_string(), |d| format!("{}s", d.as_secs()));

            print!(
                "\r  [{:>6.2}%] {}/s - ETA: {}    ",
                progress.percentage(),
                format_size(progress.speed_bps),
                eta
            );
            let _ = io::stdout().flush();
        }
    }

    println!();
}
