//! Host side connection manager.
//!
//! A [`Host`] offers one file. [`Host::serve`] accepts connections until it is
//! stopped and runs each session in its own task:
//!
//! ```text
//! accept ─▶ spawn ─▶ handshake ─▶ register peer ─▶ FILE_INFO ─▶ CHUNK* ─▶ EOF
//!                        │                                                 │
//!                        └── failure: close ◀── always: close + unregister ┘
//! ```
//!
//! Sessions share nothing but the [`PeerRegistry`]. A failing session is logged
//! and cleaned up without affecting the accept loop or other sessions.
//!
//! Stopping is two-staged: cancelling the shutdown token stops accepting and
//! lets in-flight sessions finish. Cancelling the abort token, or running past
//! the configured drain timeout, drops whatever is still running.

mod registry;

pub use registry::{Peer, PeerGuard, PeerRegistry};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::connection::{Acceptor, Connection};
use crate::error::{Error, Result};
use crate::file::OfferedFile;
use crate::handshake::{self, Ticket};
use crate::transfer::{self, ProgressTracker, SessionPhase};

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Configuration for a host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Ticket receivers must present
    pub ticket: Ticket,
    /// File offered to every receiver
    pub file_path: PathBuf,
    /// Data chunk size in bytes
    pub chunk_size: usize,
    /// Time a receiver has to complete the handshake (`None` waits forever)
    pub handshake_timeout: Option<Duration>,
    /// Stop accepting after this many successful transfers
    pub max_transfers: Option<usize>,
    /// Time in-flight sessions get to finish once serving stops (`None` waits forever)
    pub drain_timeout: Option<Duration>,
}

impl HostConfig {
    /// Create a config with default chunk size and handshake timeout.
    pub fn new(ticket: impl Into<Ticket>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            ticket: ticket.into(),
            file_path: file_path.into(),
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            handshake_timeout: Some(Duration::from_secs(crate::DEFAULT_HANDSHAKE_TIMEOUT_SECS)),
            max_transfers: None,
            drain_timeout: None,
        }
    }

    /// Set the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set or disable the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Limit the number of successful transfers.
    #[must_use]
    pub fn with_max_transfers(mut self, max_transfers: Option<usize>) -> Self {
        self.max_transfers = max_transfers;
        self
    }

    /// Bound how long in-flight sessions may keep running after serving stops.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct HostInner {
    config: HostConfig,
    offered: OfferedFile,
    registry: PeerRegistry,
}

/// Serves one file to every receiver presenting the right ticket.
///
/// Cloning is cheap; clones share the offered file and the peer registry.
#[derive(Debug, Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

impl Host {
    /// Create a host, checking the offered file up front.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` or `Error::InvalidPath` if the file cannot
    /// be offered, or `Error::InvalidInput` for an unusable config.
    pub fn new(mut config: HostConfig) -> Result<Self> {
        if config.max_transfers == Some(0) {
            return Err(Error::InvalidInput(
                "max_transfers must be at least 1".to_string(),
            ));
        }
        if config.chunk_size == 0 {
            return Err(Error::InvalidInput(
                "chunk_size must be at least 1 byte".to_string(),
            ));
        }
        if config.chunk_size > crate::MAX_CHUNK_SIZE {
            tracing::debug!(
                "Clamping chunk size {} to {}",
                config.chunk_size,
                crate::MAX_CHUNK_SIZE
            );
            config.chunk_size = crate::MAX_CHUNK_SIZE;
        }

        let offered = OfferedFile::from_path(&config.file_path)?;

        Ok(Self {
            inner: Arc::new(HostInner {
                config,
                offered,
                registry: PeerRegistry::new(),
            }),
        })
    }

    /// The host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// The offered file.
    pub fn offered(&self) -> &OfferedFile {
        &self.inner.offered
    }

    /// Path of the offered file.
    pub fn file_path(&self) -> &Path {
        &self.inner.offered.path
    }

    /// Registry of active sessions.
    pub fn registry(&self) -> &PeerRegistry {
        &self.inner.registry
    }

    /// Accept connections and serve each in its own task.
    ///
    /// Runs until `shutdown` is cancelled, the acceptor is exhausted, or
    /// `max_transfers` successful transfers have completed. Sessions still in
    /// flight at that point get up to `drain_timeout` to finish.
    ///
    /// Returns the number of successful transfers.
    pub async fn serve<A: Acceptor>(&self, acceptor: A, shutdown: CancellationToken) -> usize {
        self.serve_until(acceptor, shutdown, CancellationToken::new()).await
    }

    /// Like [`Host::serve`], but cancelling `abort` also drops every session
    /// still in flight instead of waiting for it.
    pub async fn serve_until<A: Acceptor>(
        &self,
        mut acceptor: A,
        shutdown: CancellationToken,
        abort: CancellationToken,
    ) -> usize {
        let mut sessions = JoinSet::new();
        let mut completed = 0usize;

        tracing::info!(
            "Offering {} ({} bytes)",
            self.inner.offered.name,
            self.inner.offered.size
        );

        loop {
            if self.limit_reached(completed) {
                tracing::info!(
                    "Reached {} completed transfers, no longer accepting",
                    completed
                );
                break;
            }

            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!("Shutdown requested");
                    break;
                }
                () = abort.cancelled() => {
                    tracing::debug!("Abort requested");
                    break;
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    completed += tally(joined);
                }
                accepted = acceptor.accept() => match accepted {
                    Ok(Some(conn)) => {
                        let host = self.clone();
                        let token = shutdown.clone();
                        sessions.spawn(async move {
                            host.handle_connection(conn, &token).await
                        });
                    }
                    Ok(None) => {
                        tracing::debug!("Connection source exhausted");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        completed + self.drain(&mut sessions, &abort).await
    }

    /// Wait for in-flight sessions until they finish, `abort` fires, or the
    /// drain timeout runs out. Whatever is left is then dropped, which closes
    /// its connection and unregisters its peer.
    async fn drain(
        &self,
        sessions: &mut JoinSet<Result<u64>>,
        abort: &CancellationToken,
    ) -> usize {
        let mut completed = 0usize;
        if sessions.is_empty() {
            return completed;
        }
        tracing::debug!("Waiting for {} in-flight sessions", sessions.len());

        let limit = self.inner.config.drain_timeout;
        let expired = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        loop {
            tokio::select! {
                joined = sessions.join_next() => match joined {
                    Some(joined) => completed += tally(joined),
                    None => return completed,
                },
                () = abort.cancelled() => {
                    tracing::warn!("Aborting {} in-flight sessions", sessions.len());
                    break;
                }
                () = &mut expired => {
                    tracing::warn!(
                        "{} sessions still running after drain timeout, aborting",
                        sessions.len()
                    );
                    break;
                }
            }
        }

        sessions.shutdown().await;
        completed
    }

    /// Run one session on `conn`: handshake, file info, data phase.
    ///
    /// The connection is shut down and the peer unregistered on every exit
    /// path. Returns the number of content bytes sent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if `cancel` fired before the session began,
    /// `Error::Timeout` if the handshake did not finish in time, or the first
    /// handshake, file-info, or data-phase error.
    pub async fn handle_connection<C: Connection>(
        &self,
        mut conn: C,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let remote = conn.remote_id();
        tracing::debug!("Connection from {}", remote);

        let result = if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            self.run_session(&mut conn, &remote).await
        };

        let _ = conn.shutdown().await;

        match &result {
            Ok(bytes) => tracing::info!(
                "Sent {} ({} bytes) to {}",
                self.inner.offered.name,
                bytes,
                remote
            ),
            Err(Error::AuthenticationFailed) => {
                tracing::warn!("Rejected {}: ticket mismatch", remote);
            }
            Err(e) => tracing::warn!("Session with {} failed: {}", remote, e),
        }

        result
    }

    async fn run_session<C: Connection>(&self, conn: &mut C, remote: &str) -> Result<u64> {
        let config = &self.inner.config;
        let offered = &self.inner.offered;
        let progress = ProgressTracker::new();

        let handshake = handshake::respond(conn, &config.ticket);
        let request = match config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| Error::Timeout(limit.as_secs()))??,
            None => handshake.await?,
        };

        let _peer = self.inner.registry.register(remote, progress.subscribe());
        tracing::info!(
            "Receiver {} authenticated (protocol {})",
            remote,
            request.version
        );

        progress.set_phase(SessionPhase::SendingInfo);
        progress.set_file(&offered.name, offered.size);
        transfer::send_file_info(conn, &offered.name, offered.size).await?;

        let sent = transfer::stream_file(conn, &offered.path, config.chunk_size, &progress).await;
        if sent.is_err() {
            progress.set_phase(SessionPhase::Failed);
        }
        sent
    }

    fn limit_reached(&self, completed: usize) -> bool {
        self.inner
            .config
            .max_transfers
            .is_some_and(|max| completed >= max)
    }
}

fn tally(joined: std::result::Result<Result<u64>, JoinError>) -> usize {
    match joined {
        Ok(Ok(_)) => 1,
        Ok(Err(_)) => 0,
        Err(e) => {
            tracing::error!("Session task ended abnormally: {}", e);
            0
        }
    }
}
