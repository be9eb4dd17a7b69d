//! Ticket handshake.
//!
//! A single round trip that authenticates the receiver before the host
//! exposes anything about the offered file:
//!
//! - Receiver: `Idle → AwaitingResponse → {Authenticated | Rejected}`
//! - Host: `Idle → Verifying → {Authenticated | Rejected}`
//!
//! Tickets are pre-shared opaque strings compared by exact equality. How they
//! are minted and distributed is up to the caller.

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Result};
use crate::protocol::{self, HandshakeRequest, HandshakeResponse, Message};

/// A pre-shared ticket.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ticket(String);

impl Ticket {
    /// Wrap a ticket string as-is (no trimming, no case folding).
    pub fn new(ticket: impl Into<String>) -> Self {
        Self(ticket.into())
    }

    /// The raw ticket string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a presented ticket matches this one exactly.
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ticket(<redacted>)")
    }
}

impl From<String> for Ticket {
    fn from(ticket: String) -> Self {
        Self(ticket)
    }
}

impl From<&str> for Ticket {
    fn from(ticket: &str) -> Self {
        Self(ticket.to_string())
    }
}

/// Receiver side: present `ticket` and wait for the host's verdict.
///
/// On `Err` the caller must close the connection; nothing is retried here.
///
/// # Errors
///
/// Returns `Error::HandshakeRejected` if the host answers `"failure"`, or a
/// framing/decoding error if the exchange itself fails.
pub async fn initiate<S>(stream: &mut S, ticket: &Ticket) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = Message::Handshake(HandshakeRequest::new(ticket.as_str()));
    protocol::write_message(stream, &request).await?;

    let response: HandshakeResponse = protocol::read_message(stream).await?;
    if !response.is_success() {
        return Err(Error::HandshakeRejected);
    }

    tracing::debug!("Handshake accepted by host");
    Ok(())
}

/// Host side: read the receiver's request and check it against `expected`.
///
/// A mismatch is answered with a `"failure"` response before returning
/// `Error::AuthenticationFailed`; the caller then drops the connection.
///
/// # Errors
///
/// Returns an error if the request cannot be read or decoded, the ticket does
/// not match, or either response cannot be written.
pub async fn respond<S>(stream: &mut S, expected: &Ticket) -> Result<HandshakeRequest>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = match protocol::read_message(stream).await? {
        Message::Handshake(request) => request,
        other => {
            return Err(Error::UnexpectedMessage {
                expected: "Handshake",
                actual: other.name().to_string(),
            })
        }
    };

    if request.version != crate::PROTOCOL_VERSION {
        tracing::warn!(
            "Receiver speaks protocol version {}, expected {}",
            request.version,
            crate::PROTOCOL_VERSION
        );
    }

    if !expected.matches(&request.ticket) {
        protocol::write_message(stream, &HandshakeResponse::failure()).await?;
        return Err(Error::AuthenticationFailed);
    }

    protocol::write_message(stream, &HandshakeResponse::success()).await?;
    Ok(request)
}
