//! TicketShare wire protocol implementation.
//!
//! Every message travels as one length-prefixed frame over an ordered,
//! reliable byte stream.
//!
//! ## Frame Format
//!
//! ```text
//! ┌────────────────┬──────────────────────────────────────────┐
//! │     Length     │                 Payload                  │
//! │ 4 bytes (BE)   │        0..=10 MiB bytes (UTF-8 JSON)     │
//! └────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Frames carry no type tag of their own. The receiving side knows which
//! message to expect from the protocol phase, and typed payloads embed a
//! `type` field (see [`Message`]).
//!
//! ## Sequencing
//!
//! ```text
//! receiver                         host
//!    │ ── Handshake{ticket} ──────▶ │
//!    │ ◀───── {status} ──────────── │   (connection ends on "failure")
//!    │ ◀───── FILE_INFO ─────────── │
//!    │ ◀───── CHUNK * ───────────── │
//!    │ ◀───── EOF ───────────────── │
//! ```

mod message;

pub use message::{
    DataChunk, FileInfo, HandshakeRequest, HandshakeResponse, HandshakeStatus, Message,
};

use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

pub use crate::MAX_FRAME_SIZE;

/// Length prefix size in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode a message payload to JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a message payload from JSON bytes.
///
/// # Errors
///
/// Returns `Error::MalformedPayload` if the bytes are not the expected shape.
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| Error::MalformedPayload(e.to_string()))
}

/// Write one frame: the big-endian payload length followed by the payload.
///
/// The size check happens before anything is written, so an oversize payload
/// leaves the stream untouched.
///
/// # Errors
///
/// Returns `Error::FrameTooLarge` for payloads above [`MAX_FRAME_SIZE`], or an
/// I/O error if the stream rejects the write.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: payload.len() as u64,
            max: MAX_FRAME_SIZE,
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    let length = payload.len() as u32;

    writer.write_all(&length.to_be_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}

/// Read one complete frame and return its payload.
///
/// The declared length is validated before the payload buffer is allocated.
///
/// # Errors
///
/// - `Error::TruncatedHeader` if the stream ends inside the length prefix
/// - `Error::FrameTooLarge` if the declared length exceeds [`MAX_FRAME_SIZE`]
/// - `Error::TruncatedPayload` if the stream ends inside the payload
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let received = read_full(reader, &mut prefix).await?;
    if received < LENGTH_PREFIX_SIZE {
        return Err(Error::TruncatedHeader { received });
    }

    let length = u32::from_be_bytes(prefix) as usize;
    if length > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: length as u64,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; length];
    let received = read_full(reader, &mut payload).await?;
    if received < length {
        return Err(Error::TruncatedPayload {
            expected: length,
            received,
        });
    }

    Ok(payload)
}

/// Encode `message` as JSON and write it as one frame.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = encode_payload(message)?;
    write_frame(writer, &payload).await
}

/// Read one frame and decode it as `T`.
///
/// Framing failures keep their framing variants; a payload that reads fine but
/// does not decode is `Error::MalformedPayload`.
///
/// # Errors
///
/// Returns an error if reading or decoding fails.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let payload = read_frame(reader).await?;
    decode_payload(&payload)
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
