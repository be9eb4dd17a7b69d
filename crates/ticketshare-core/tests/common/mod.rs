//! Common test utilities for TicketShare integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use ticketshare_core::connection::{ChannelAcceptor, NamedStream};
use ticketshare_core::{Host, HostConfig};
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// In-memory connection as seen by the host.
pub type PipeConnection = NamedStream<DuplexStream>;

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Assert that two files have identical content.
pub fn assert_files_equal(path1: &Path, path2: &Path) {
    let content1 = std::fs::read(path1).expect("Failed to read first file");
    let content2 = std::fs::read(path2).expect("Failed to read second file");
    assert_eq!(content1, content2, "File contents differ");
}

/// A host serving over an in-memory channel of duplex pipes.
pub struct PipeHost {
    pub host: Host,
    pub connect_tx: tokio::sync::mpsc::Sender<PipeConnection>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<usize>,
}

impl PipeHost {
    /// Start serving `config` in the background.
    pub fn start(config: HostConfig) -> Self {
        let host = Host::new(config).expect("Failed to create host");
        let (connect_tx, acceptor) = ChannelAcceptor::channel(16);
        let shutdown = CancellationToken::new();

        let task = {
            let host = host.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { host.serve(acceptor, shutdown).await })
        };

        Self {
            host,
            connect_tx,
            shutdown,
            task,
        }
    }

    /// Open a new pipe to the host, returning the receiver's end.
    pub async fn connect(&self, remote_id: &str, buffer: usize) -> DuplexStream {
        let (receiver_side, host_side) = tokio::io::duplex(buffer);
        self.connect_tx
            .send(NamedStream::new(host_side, remote_id))
            .await
            .expect("Host stopped accepting");
        receiver_side
    }

    /// Stop the host and return its completed-transfer count.
    pub async fn stop(self) -> usize {
        self.shutdown.cancel();
        self.task.await.expect("Serve task panicked")
    }
}

/// Poll `condition` until it holds, panicking after `timeout`.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Condition not reached in time");
}
