//! Payload shapes exchanged over a TicketShare connection.
//!
//! ```text
//! HandshakeRequest  {"type":"Handshake","version":"1.0","ticket":<string>}
//! HandshakeResponse {"status":"success"|"failure"}
//! FileInfo          {"type":"FILE_INFO","filename":<string>,"size":<u64>}
//! DataChunk         {"type":"CHUNK","data":<base64>}
//! EndOfTransfer     {"type":"EOF"}
//! ```

use serde::{Deserialize, Serialize};

/// Typed messages, tagged by their embedded `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Receiver's opening request
    #[serde(rename = "Handshake")]
    Handshake(HandshakeRequest),
    /// Description of the offered file
    #[serde(rename = "FILE_INFO")]
    FileInfo(FileInfo),
    /// One slice of file content
    #[serde(rename = "CHUNK")]
    Chunk(DataChunk),
    /// End of the data phase
    #[serde(rename = "EOF")]
    EndOfTransfer,
}

impl Message {
    /// Wire name of this message's `type` field.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "Handshake",
            Self::FileInfo(_) => "FILE_INFO",
            Self::Chunk(_) => "CHUNK",
            Self::EndOfTransfer => "EOF",
        }
    }
}

/// Handshake request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Protocol version string
    #[serde(default)]
    pub version: String,
    /// Ticket presented by the receiver
    #[serde(default)]
    pub ticket: String,
}

impl HandshakeRequest {
    /// Create a request for the current protocol version.
    pub fn new(ticket: impl Into<String>) -> Self {
        Self {
            version: crate::PROTOCOL_VERSION.to_string(),
            ticket: ticket.into(),
        }
    }
}

/// Handshake outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeStatus {
    /// Ticket accepted
    Success,
    /// Ticket rejected
    Failure,
}

/// Handshake response payload (untagged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Handshake outcome
    pub status: HandshakeStatus,
}

impl HandshakeResponse {
    /// A `"success"` response.
    pub const fn success() -> Self {
        Self {
            status: HandshakeStatus::Success,
        }
    }

    /// A `"failure"` response.
    pub const fn failure() -> Self {
        Self {
            status: HandshakeStatus::Failure,
        }
    }

    /// Whether the host accepted the ticket.
    pub const fn is_success(&self) -> bool {
        matches!(self.status, HandshakeStatus::Success)
    }
}

/// File info payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Name of the offered file (no directory components)
    pub filename: String,
    /// Advertised size in bytes
    pub size: u64,
}

/// Data chunk payload. The bytes travel base64-encoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChunk {
    /// Chunk content
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl DataChunk {
    /// Wrap raw chunk bytes.
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl std::fmt::Debug for DataChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChunk")
            .field("len", &self.data.len())
            .finish()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
