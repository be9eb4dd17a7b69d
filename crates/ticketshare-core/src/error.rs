//! Error types for TicketShare.
//!
//! This module provides a unified error type for all TicketShare operations,
//! with specific error variants for different failure modes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized `Result` type for TicketShare operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure categories shared by all error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Truncated or oversize frame
    Framing,
    /// Payload that does not decode as the expected message
    MalformedPayload,
    /// Ticket mismatch or handshake rejection
    Authentication,
    /// Open, create, read, or write failure on local storage
    FileAccess,
    /// Transport closed before logical completion
    ConnectionLost,
    /// Everything else (configuration, timeouts, cancellation, raw I/O)
    Other,
}

/// The main error type for TicketShare.
#[derive(Error, Debug)]
pub enum Error {
    /// Frame payload larger than the protocol allows
    #[error("frame size {size} exceeds max limit {max}")]
    FrameTooLarge {
        /// Declared or attempted payload length
        size: u64,
        /// Maximum permitted payload length
        max: usize,
    },

    /// Stream ended inside the 4-byte length prefix
    #[error("stream ended after {received} of 4 frame length bytes")]
    TruncatedHeader {
        /// Length bytes read before the stream ended
        received: usize,
    },

    /// Stream ended inside a frame payload
    #[error("stream ended after {received} of {expected} payload bytes")]
    TruncatedPayload {
        /// Declared payload length
        expected: usize,
        /// Payload bytes read before the stream ended
        received: usize,
    },

    /// Frame payload could not be decoded
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A well-formed message arrived in the wrong protocol phase
    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Message type the current phase accepts
        expected: &'static str,
        /// Message type actually received
        actual: String,
    },

    /// Message could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Presented ticket did not match the host's ticket
    #[error("receiver ticket verification failed: ticket mismatch")]
    AuthenticationFailed,

    /// Host answered the handshake with a failure status
    #[error("host rejected handshake")]
    HandshakeRejected,

    /// File info could not be sent
    #[error("failed to send file info: {0}")]
    MetadataWrite(#[source] Box<Error>),

    /// File info could not be received
    #[error("failed to read file info: {0}")]
    MetadataRead(#[source] Box<Error>),

    /// Source file could not be opened
    #[error("cannot open file '{}': {source}", path.display())]
    FileOpen {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Source file could not be read mid-stream
    #[error("cannot read file '{}': {source}", path.display())]
    FileRead {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Destination file could not be created
    #[error("cannot create file '{}': {source}", path.display())]
    FileCreate {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Destination file could not be written
    #[error("cannot write file '{}': {source}", path.display())]
    FileWrite {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Transport closed before the end-of-transfer marker
    #[error("connection lost before the transfer completed")]
    ConnectionLost,

    /// Session was cancelled before it started
    #[error("session cancelled")]
    Cancelled,

    /// Operation timeout
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// File not found
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Invalid path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid user input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the failure category for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FrameTooLarge { .. }
            | Self::TruncatedHeader { .. }
            | Self::TruncatedPayload { .. } => ErrorKind::Framing,
            Self::MalformedPayload(_) | Self::UnexpectedMessage { .. } => {
                ErrorKind::MalformedPayload
            }
            Self::AuthenticationFailed | Self::HandshakeRejected => ErrorKind::Authentication,
            Self::MetadataWrite(inner) | Self::MetadataRead(inner) => inner.kind(),
            Self::FileOpen { .. }
            | Self::FileRead { .. }
            | Self::FileCreate { .. }
            | Self::FileWrite { .. }
            | Self::FileNotFound(_)
            | Self::InvalidPath(_) => ErrorKind::FileAccess,
            Self::ConnectionLost => ErrorKind::ConnectionLost,
            Self::Io(_) if self.is_end_of_stream() => ErrorKind::ConnectionLost,
            _ => ErrorKind::Other,
        }
    }

    /// Returns whether this error means the transport closed underneath us.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            Self::TruncatedHeader { .. } | Self::TruncatedPayload { .. } | Self::ConnectionLost => {
                true
            }
            Self::MetadataRead(inner) | Self::MetadataWrite(inner) => inner.is_end_of_stream(),
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
