//! Transport capability for TicketShare sessions.
//!
//! The protocol runs over any ordered, reliable byte stream that can name its
//! remote end. Plain TCP sockets satisfy that directly; streams handed over by
//! an overlay network (or in-memory pipes in tests) are wrapped in
//! [`NamedStream`] and delivered to the host through a [`ChannelAcceptor`].

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::DEFAULT_PORT;

/// Idle time before TCP keepalive starts
const KEEPALIVE_TIME: Duration = Duration::from_secs(60);

/// Interval between TCP keepalive packets
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// A bidirectional ordered byte stream with a remote identifier.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Identifier of the remote end, used as the peer registry key.
    fn remote_id(&self) -> String;
}

impl Connection for TcpStream {
    fn remote_id(&self) -> String {
        self.peer_addr()
            .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string())
    }
}

/// Any byte stream paired with a caller-supplied remote identifier.
#[derive(Debug)]
pub struct NamedStream<S> {
    inner: S,
    remote_id: String,
}

impl<S> NamedStream<S> {
    /// Wrap `inner`, reporting `remote_id` as its remote end.
    pub fn new(inner: S, remote_id: impl Into<String>) -> Self {
        Self {
            inner,
            remote_id: remote_id.into(),
        }
    }
}

impl<S> Connection for NamedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn remote_id(&self) -> String {
        self.remote_id.clone()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for NamedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for NamedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Source of incoming connections for the host.
pub trait Acceptor: Send {
    /// Connection type produced by this acceptor.
    type Conn: Connection;

    /// Wait for the next connection.
    ///
    /// `Ok(None)` means no further connections will arrive. Errors are
    /// per-accept and do not end the source.
    fn accept(&mut self) -> impl Future<Output = io::Result<Option<Self::Conn>>> + Send;
}

impl Acceptor for TcpListener {
    type Conn = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<Option<TcpStream>>> + Send {
        async move {
            let (stream, addr) = TcpListener::accept(self).await?;
            if let Err(e) = configure_tcp_keepalive(&stream) {
                tracing::debug!("Failed to enable keepalive for {}: {}", addr, e);
            }
            Ok(Some(stream))
        }
    }
}

/// Acceptor fed with already-established connections over a channel.
///
/// Ends once every sender is dropped and the queue is empty.
#[derive(Debug)]
pub struct ChannelAcceptor<C> {
    rx: mpsc::Receiver<C>,
}

impl<C: Connection> ChannelAcceptor<C> {
    /// Create an acceptor and the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<C>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

impl<C: Connection> Acceptor for ChannelAcceptor<C> {
    type Conn = C;

    fn accept(&mut self) -> impl Future<Output = io::Result<Option<C>>> + Send {
        async move { Ok(self.rx.recv().await) }
    }
}

/// Enable TCP keepalive so dead peers are noticed during long transfers.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
pub fn configure_tcp_keepalive(stream: &TcpStream) -> io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_TIME)
        .with_interval(KEEPALIVE_INTERVAL);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// Parse a host address string into a `SocketAddr`.
///
/// Accepts formats:
/// - `IP` (e.g., `192.168.1.100`) - uses default port 8080
/// - `IP:PORT` (e.g., `192.168.1.100:9000`) - uses specified port
/// - `[IPv6]` (e.g., `[::1]`) - uses default port 8080
/// - `[IPv6]:PORT` (e.g., `[::1]:9000`) - uses specified port
///
/// # Examples
///
/// ```
/// use ticketshare_core::connection::parse_host_address;
///
/// let addr = parse_host_address("192.168.1.100").unwrap();
/// assert_eq!(addr.port(), 8080);
///
/// let addr = parse_host_address("192.168.1.100:9000").unwrap();
/// assert_eq!(addr.port(), 9000);
/// ```
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the string is not one of those forms.
pub fn parse_host_address(host: &str) -> Result<SocketAddr> {
    let host = host.trim();
    let invalid = || {
        Error::InvalidInput(format!(
            "invalid host address '{host}', expected IP or IP:PORT \
             (e.g. 192.168.1.100:{DEFAULT_PORT})"
        ))
    };

    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Some(bracketed) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        let ip: IpAddr = bracketed.parse().map_err(|_| invalid())?;
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    match host.rsplit_once(':') {
        Some((ip_part, port_part)) if !ip_part.contains(':') => {
            let ip: IpAddr = ip_part.parse().map_err(|_| invalid())?;
            let port: u16 = port_part.parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "invalid port '{port_part}', must be a number between 1 and 65535"
                ))
            })?;
            Ok(SocketAddr::new(ip, port))
        }
        _ => Err(invalid()),
    }
}
