//! File-info exchange and data phase.
//!
//! After a successful handshake the host sends one `FILE_INFO` message, then
//! the file as an ordered run of `CHUNK` messages, then `EOF`:
//!
//! - Host: `SendingInfo → Transferring → Done`
//! - Receiver: `ReceivingInfo → Transferring → Done`
//!
//! Either side moves to `Failed` on the first error. Progress for a session is
//! published on a `watch` channel so a CLI can render it without polling the
//! stream.

mod receiver;
mod sender;

pub use receiver::{
    receive_file, receive_file_info, receive_into, ReceiveConfig, ReceivedFile, Receiver,
};
pub use sender::{send_file_info, stream_file};

use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Where a session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Exchanging the ticket
    Handshaking,
    /// Host is sending file info
    SendingInfo,
    /// Receiver is waiting for file info
    ReceivingInfo,
    /// Data phase in progress
    Transferring,
    /// End-of-transfer marker sent or received
    Done,
    /// Session ended with an error
    Failed,
}

/// Progress information for one session.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Current phase
    pub phase: SessionPhase,
    /// File name as advertised
    pub file_name: String,
    /// Bytes moved so far
    pub bytes_transferred: u64,
    /// Advertised size
    pub total_bytes: u64,
    /// Transfer speed in bytes per second
    pub speed_bps: u64,
    /// Estimated time remaining
    pub eta: Option<Duration>,
    /// When the session started
    pub started_at: Instant,
}

impl TransferProgress {
    /// Create progress for a session that has not exchanged anything yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Handshaking,
            file_name: String::new(),
            bytes_transferred: 0,
            total_bytes: 0,
            speed_bps: 0,
            eta: None,
            started_at: Instant::now(),
        }
    }

    /// Get progress as a percentage (0.0 - 100.0).
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0).min(100.0)
        }
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishing side of a session's progress channel.
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<TransferProgress>,
}

impl ProgressTracker {
    /// Create a tracker starting in the handshake phase.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TransferProgress::new());
        Self { tx }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> watch::Receiver<TransferProgress> {
        self.tx.subscribe()
    }

    /// Current progress.
    pub fn snapshot(&self) -> TransferProgress {
        self.tx.borrow().clone()
    }

    /// Move to `phase`.
    pub fn set_phase(&self, phase: SessionPhase) {
        self.tx.send_modify(|p| p.phase = phase);
    }

    /// Record the advertised file.
    pub fn set_file(&self, file_name: &str, total_bytes: u64) {
        self.tx.send_modify(|p| {
            p.file_name = file_name.to_string();
            p.total_bytes = total_bytes;
        });
    }

    /// Count `bytes` more as transferred and refresh the rate estimate.
    pub fn advance(&self, bytes: u64) {
        self.tx.send_modify(|p| {
            p.bytes_transferred += bytes;
            let elapsed = p.started_at.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    p.speed_bps = (p.bytes_transferred as f64 / elapsed) as u64;
                }
                let remaining = p.total_bytes.saturating_sub(p.bytes_transferred);
                if p.speed_bps > 0 {
                    p.eta = Some(Duration::from_secs(remaining / p.speed_bps));
                }
            }
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let mut progress = TransferProgress::new();
        assert!((progress.percentage() - 100.0).abs() < f64::EPSILON);

        progress.total_bytes = 200;
        progress.bytes_transferred = 50;
        assert!((progress.percentage() - 25.0).abs() < f64::EPSILON);

        progress.bytes_transferred = 400;
        assert!((progress.percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tracker_publishes_updates() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();
        assert_eq!(rx.borrow().phase, SessionPhase::Handshaking);

        tracker.set_phase(SessionPhase::Transferring);
        tracker.set_file("a.bin", 10);
        tracker.advance(4);
        tracker.advance(6);

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.phase, SessionPhase::Transferring);
        assert_eq!(seen.file_name, "a.bin");
        assert_eq!(seen.bytes_transferred, 10);
        assert_eq!(tracker.snapshot().total_bytes, 10);
    }

    #[test]
    fn test_tracker_without_subscribers_still_records() {
        let tracker = ProgressTracker::new();
        tracker.advance(3);
        assert_eq!(tracker.snapshot().bytes_transferred, 3);
    }
}
