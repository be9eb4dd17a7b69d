//! # TicketShare Core Library
//!
//! `ticketshare-core` implements the TicketShare transfer protocol: one peer
//! (the host) offers a single local file, and any number of receivers holding
//! the right ticket fetch it over an already-established byte stream.
//!
//! ## Features
//!
//! - **Transport agnostic**: plain TCP sockets or overlay-provided streams
//! - **Bounded framing**: 4-byte length prefix, 10 MiB frame cap checked before allocation
//! - **Ticket handshake**: exact-match ticket check before any file data is exposed
//! - **Concurrent host**: one task per connection with a shared peer registry
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`connection`] - Transport capability traits and TCP helpers
//! - [`mod@file`] - Chunked file reading, writing, and filename sanitizing
//! - [`handshake`] - Ticket handshake (both sides)
//! - [`host`] - Connection manager and peer registry
//! - [`protocol`] - Frame codec and message types
//! - [`transfer`] - File-info exchange and data phase (both sides)
//!
//! ## Example
//!
//! ```rust,ignore
//! use ticketshare_core::{Host, HostConfig, Ticket};
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//!
//! let host = Host::new(HostConfig::new(Ticket::new("T1"), "report.pdf"))?;
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! host.serve(listener, CancellationToken::new()).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod connection;
pub mod error;
pub mod file;
pub mod handshake;
pub mod host;
pub mod protocol;
pub mod transfer;

pub use error::{Error, ErrorKind, Result};
pub use handshake::Ticket;
pub use host::{Host, HostConfig, Peer, PeerRegistry};
pub use transfer::{ReceiveConfig, ReceivedFile, Receiver, SessionPhase, TransferProgress};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version carried in every handshake request
pub const PROTOCOL_VERSION: &str = "1.0";

/// Maximum payload size of a single frame (10 MiB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum size of one data chunk (1 MiB)
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Default chunk size for file transfers (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = MAX_CHUNK_SIZE;

/// Default TCP port for hosting
pub const DEFAULT_PORT: u16 = 8080;

/// Default time a connecting receiver has to complete the handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;
