//! Receiver side: handshake, file info, and data phase on one connection.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use super::{ProgressTracker, SessionPhase, TransferProgress};
use crate::error::{Error, Result};
use crate::file::{self, FileWriter, WrittenFile};
use crate::handshake::{self, Ticket};
use crate::protocol::{self, FileInfo, Message};

/// Read the host's `FILE_INFO` message.
///
/// The advertised size is informational only.
///
/// # Errors
///
/// Returns `Error::MetadataRead` wrapping any framing or decode failure, or an
/// `UnexpectedMessage` if some other message type arrives first.
pub async fn receive_file_info<R>(stream: &mut R) -> Result<FileInfo>
where
    R: AsyncRead + Unpin,
{
    let message: Message = protocol::read_message(stream)
        .await
        .map_err(|e| Error::MetadataRead(Box::new(e)))?;

    match message {
        Message::FileInfo(info) => Ok(info),
        other => Err(Error::MetadataRead(Box::new(Error::UnexpectedMessage {
            expected: "FILE_INFO",
            actual: other.name().to_string(),
        }))),
    }
}

/// Write incoming chunks to `destination` until the `EOF` marker.
///
/// A partially written file stays on disk when this fails.
///
/// # Errors
///
/// - `Error::FileCreate` / `Error::FileWrite` for local file failures
/// - `Error::ConnectionLost` if the stream ends before `EOF`
/// - `Error::MalformedPayload` / `Error::UnexpectedMessage` for bad frames
pub async fn receive_file<R>(
    stream: &mut R,
    destination: &Path,
    progress: &ProgressTracker,
) -> Result<WrittenFile>
where
    R: AsyncRead + Unpin,
{
    let writer = FileWriter::create(destination).await?;
    receive_into(stream, writer, progress).await
}

/// Run the data phase into an already created `writer`.
///
/// Whatever was written stays in the writer's file when this fails.
///
/// # Errors
///
/// Same as [`receive_file`], apart from `Error::FileCreate`.
pub async fn receive_into<R>(
    stream: &mut R,
    mut writer: FileWriter,
    progress: &ProgressTracker,
) -> Result<WrittenFile>
where
    R: AsyncRead + Unpin,
{
    progress.set_phase(SessionPhase::Transferring);

    if let Err(e) = receive_chunks(stream, &mut writer, progress).await {
        let path = writer.output_path().to_path_buf();
        let kept = writer.abandon().await;
        tracing::debug!("Leaving {} partial bytes at {}", kept, path.display());
        return Err(e);
    }

    let written = writer.finalize().await?;
    progress.set_phase(SessionPhase::Done);
    Ok(written)
}

async fn receive_chunks<R>(
    stream: &mut R,
    writer: &mut FileWriter,
    progress: &ProgressTracker,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let message: Message = match protocol::read_message(stream).await {
            Ok(message) => message,
            Err(e) if e.is_end_of_stream() => {
                tracing::debug!(
                    "Stream closed after {} bytes without end-of-transfer: {}",
                    writer.bytes_written(),
                    e
                );
                return Err(Error::ConnectionLost);
            }
            Err(e) => return Err(e),
        };

        match message {
            Message::Chunk(chunk) => {
                if chunk.data.len() > crate::MAX_CHUNK_SIZE {
                    return Err(Error::MalformedPayload(format!(
                        "chunk of {} bytes exceeds {} byte limit",
                        chunk.data.len(),
                        crate::MAX_CHUNK_SIZE
                    )));
                }
                writer.write_chunk(&chunk.data).await?;
                progress.advance(chunk.data.len() as u64);
            }
            Message::EndOfTransfer => return Ok(()),
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "CHUNK or EOF",
                    actual: other.name().to_string(),
                })
            }
        }
    }
}

/// Configuration for receiving a file.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// Ticket presented to the host
    pub ticket: Ticket,
    /// Directory the advertised filename is placed in
    pub output_dir: PathBuf,
    /// Exact destination path, overriding `output_dir`
    pub destination: Option<PathBuf>,
}

impl ReceiveConfig {
    /// Receive into the current directory.
    pub fn new(ticket: impl Into<Ticket>) -> Self {
        Self {
            ticket: ticket.into(),
            output_dir: PathBuf::from("."),
            destination: None,
        }
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Write to exactly `destination` regardless of the advertised name.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Outcome of a completed receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Where the content was written
    pub path: PathBuf,
    /// Filename as advertised by the host
    pub file_name: String,
    /// Size as advertised by the host
    pub declared_size: u64,
    /// Bytes actually received
    pub bytes_received: u64,
    /// SHA-256 of the received bytes
    pub sha256: [u8; 32],
}

impl ReceivedFile {
    /// Whether the received byte count matches the advertised size.
    pub const fn size_matches(&self) -> bool {
        self.declared_size == self.bytes_received
    }

    /// SHA-256 as lowercase hex.
    pub fn sha256_hex(&self) -> String {
        file::to_hex(&self.sha256)
    }
}

/// One receive session over an established connection.
#[derive(Debug)]
pub struct Receiver {
    config: ReceiveConfig,
    progress: ProgressTracker,
}

impl Receiver {
    /// Create a receiver.
    pub fn new(config: ReceiveConfig) -> Self {
        Self {
            config,
            progress: ProgressTracker::new(),
        }
    }

    /// Get a progress receiver.
    pub fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress.subscribe()
    }

    /// Run the whole receiver session on `stream`.
    ///
    /// The stream is shut down on every exit path.
    ///
    /// # Errors
    ///
    /// Returns `Error::HandshakeRejected` on a ticket mismatch (file info is
    /// never read in that case), or the first file-info or data-phase error.
    pub async fn receive<S>(&self, mut stream: S) -> Result<ReceivedFile>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.run(&mut stream).await;
        let _ = stream.shutdown().await;

        match &result {
            Ok(received) => {
                tracing::info!(
                    "Received {} ({} bytes) into {}",
                    received.file_name,
                    received.bytes_received,
                    received.path.display()
                );
                if !received.size_matches() {
                    tracing::warn!(
                        "Host advertised {} bytes but sent {}",
                        received.declared_size,
                        received.bytes_received
                    );
                }
            }
            Err(e) => {
                self.progress.set_phase(SessionPhase::Failed);
                tracing::warn!("Receive failed: {}", e);
            }
        }

        result
    }

    async fn run<S>(&self, stream: &mut S) -> Result<ReceivedFile>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.progress.set_phase(SessionPhase::Handshaking);
        handshake::initiate(stream, &self.config.ticket).await?;

        self.progress.set_phase(SessionPhase::ReceivingInfo);
        let info = receive_file_info(stream).await?;
        self.progress.set_file(&info.filename, info.size);
        tracing::debug!("Host offers {} ({} bytes)", info.filename, info.size);

        let path = match &self.config.destination {
            Some(destination) => destination.clone(),
            None => file::destination_path(&self.config.output_dir, &info.filename)?,
        };

        let written = receive_file(stream, &path, &self.progress).await?;

        Ok(ReceivedFile {
            path,
            file_name: info.filename,
            declared_size: info.size,
            bytes_received: written.bytes_written,
            sha256: written.sha256,
        })
    }
}
