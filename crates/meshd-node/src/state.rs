//! Shared counters for the running daemon.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use meshd_core::NodeId;
use serde::Serialize;

/// Traffic counters, updated from the event loop and the device task.
pub struct NodeState {
    /// The local node's id.
    pub self_id: NodeId,
    /// When the daemon started.
    pub start_time: Instant,
    frames_from_device: AtomicU64,
    frames_to_device: AtomicU64,
    frames_forwarded: AtomicU64,
    frames_dropped: AtomicU64,
    gossip_sent: AtomicU64,
    device_errors: AtomicU64,
}

/// Point-in-time copy of [`NodeState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub frames_from_device: u64,
    pub frames_to_device: u64,
    pub frames_forwarded: u64,
    pub frames_dropped: u64,
    pub gossip_sent: u64,
    pub device_errors: u64,
    pub uptime_secs: u64,
}

impl NodeState {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            start_time: Instant::now(),
            frames_from_device: AtomicU64::new(0),
            frames_to_device: AtomicU64::new(0),
            frames_forwarded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            gossip_sent: AtomicU64::new(0),
            device_errors: AtomicU64::new(0),
        }
    }

    pub fn record_device_read(&self) {
        self.frames_from_device.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_write(&self) {
        self.frames_to_device.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, copies: u64) {
        self.frames_forwarded.fetch_add(copies, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gossip_sent(&self) {
        self.gossip_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_error(&self) {
        self.device_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NodeStats {
        NodeStats {
            frames_from_device: self.frames_from_device.load(Ordering::Relaxed),
            frames_to_device: self.frames_to_device.load(Ordering::Relaxed),
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            gossip_sent: self.gossip_sent.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
