//! Host side of the data phase.

use std::path::Path;

use tokio::io::AsyncWrite;

use super::{ProgressTracker, SessionPhase};
use crate::error::{Error, Result};
use crate::file::FileChunker;
use crate::protocol::{self, DataChunk, FileInfo, Message};

/// Send the `FILE_INFO` message describing the offered file.
///
/// # Errors
///
/// Returns `Error::MetadataWrite` wrapping the encode or write failure.
pub async fn send_file_info<W>(stream: &mut W, filename: &str, size: u64) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let info = Message::FileInfo(FileInfo {
        filename: filename.to_string(),
        size,
    });

    protocol::write_message(stream, &info)
        .await
        .map_err(|e| Error::MetadataWrite(Box::new(e)))
}

/// Stream the file at `path` as `CHUNK` messages followed by one `EOF`.
///
/// Returns the number of content bytes sent. A file read error aborts without
/// writing `EOF`, so the receiver sees the connection drop instead of a clean
/// completion.
///
/// # Errors
///
/// Returns `Error::FileOpen` or `Error::FileRead` for local file failures, or
/// the framing/I/O error if the stream rejects a write.
pub async fn stream_file<W>(
    stream: &mut W,
    path: &Path,
    chunk_size: usize,
    progress: &ProgressTracker,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut chunker = FileChunker::open(path, chunk_size).await?;
    progress.set_phase(SessionPhase::Transferring);

    let mut sent = 0u64;
    let mut chunks = 0u64;
    while let Some(data) = chunker.next_chunk().await? {
        let len = data.len() as u64;
        protocol::write_message(stream, &Message::Chunk(DataChunk::new(data))).await?;

        sent += len;
        chunks += 1;
        progress.advance(len);
    }

    protocol::write_message(stream, &Message::EndOfTransfer).await?;
    progress.set_phase(SessionPhase::Done);

    tracing::debug!("Sent {} bytes in {} chunks from {}", sent, chunks, path.display());
    Ok(sent)
}
