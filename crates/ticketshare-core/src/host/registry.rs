//! Registry of authenticated, in-flight sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::transfer::TransferProgress;

/// One authenticated connection with an active session.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Session id, unique per registration
    pub id: Uuid,
    /// Remote identifier reported by the transport
    pub remote: String,
    /// When the handshake completed
    pub connected_at: DateTime<Utc>,
    progress: watch::Receiver<TransferProgress>,
}

impl Peer {
    /// Latest progress of this peer's session.
    pub fn progress(&self) -> TransferProgress {
        self.progress.borrow().clone()
    }

    /// Watch this peer's progress. The channel closes when the session ends.
    pub fn subscribe(&self) -> watch::Receiver<TransferProgress> {
        self.progress.clone()
    }
}

/// Remote identifier → [`Peer`] map shared by all sessions of one host.
///
/// The lock is only held for the map operation itself, never across I/O.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<String, Peer>>>,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `remote` with its session progress and return a guard that
    /// removes it on drop.
    ///
    /// A second registration under the same remote replaces the first; the
    /// older guard then leaves the newer entry alone.
    pub fn register(
        &self,
        remote: &str,
        progress: watch::Receiver<TransferProgress>,
    ) -> PeerGuard {
        let peer = Peer {
            id: Uuid::new_v4(),
            remote: remote.to_string(),
            connected_at: Utc::now(),
            progress,
        };
        let id = peer.id;

        let replaced = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(remote.to_string(), peer);
        if replaced.is_some() {
            tracing::debug!("Replaced existing registry entry for {}", remote);
        }

        PeerGuard {
            registry: self.clone(),
            remote: remote.to_string(),
            id,
        }
    }

    /// Number of active peers.
    pub fn len(&self) -> usize {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no peer is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `remote` has an active session.
    pub fn contains(&self, remote: &str) -> bool {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(remote)
    }

    /// Look up the peer registered under `remote`.
    pub fn get(&self, remote: &str) -> Option<Peer> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(remote)
            .cloned()
    }

    /// All active peers, oldest first.
    pub fn snapshot(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self
            .peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        peers.sort_by_key(|p| p.connected_at);
        peers
    }

    fn remove(&self, remote: &str, id: Uuid) {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        if peers.get(remote).is_some_and(|p| p.id == id) {
            peers.remove(remote);
        }
    }
}

/// Removes its peer from the registry when dropped.
#[derive(Debug)]
#[must_use = "the peer is unregistered as soon as the guard is dropped"]
pub struct PeerGuard {
    registry: PeerRegistry,
    remote: String,
    id: Uuid,
}

impl PeerGuard {
    /// Session id of the guarded peer.
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for PeerGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.remote, self.id);
    }
}
