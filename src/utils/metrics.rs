//! Observability and Metrics
//!
//! Counters for the transport, link and transform layers.
//!
//! Uses atomic counters for thread-safe metrics collection; the network
//! thread writes, anyone may read a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Datagrams handed to the socket
    pub datagrams_sent: AtomicU64,
    /// Datagrams read from the socket
    pub datagrams_received: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Datagrams the framing decoder rejected
    pub decode_failures: AtomicU64,
    /// Datagrams whose checksum did not match (still processed)
    pub checksum_mismatches: AtomicU64,
    /// Inbound reliable datagrams seen twice
    pub duplicates_dropped: AtomicU64,
    /// Reliable datagrams sent again
    pub retransmissions: AtomicU64,
    /// Pure acknowledgments sent
    pub acks_sent: AtomicU64,
    /// Fragment groups completed
    pub messages_reassembled: AtomicU64,
    /// Payloads that failed to inflate
    pub transform_fallbacks: AtomicU64,
    /// Payloads whose size did not match the documented layout
    pub size_mismatches: AtomicU64,
    /// Reconnects requested by a handshake supervisor
    pub reconnects_requested: AtomicU64,
    /// Socket errors reported to a machine
    pub socket_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            datagrams_sent: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            checksum_mismatches: AtomicU64::new(0),
            duplicates_dropped: AtomicU64::new(0),
            retransmissions: AtomicU64::new(0),
            acks_sent: AtomicU64::new(0),
            messages_reassembled: AtomicU64::new(0),
            transform_fallbacks: AtomicU64::new(0),
            size_mismatches: AtomicU64::new(0),
            reconnects_requested: AtomicU64::new(0),
            socket_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a datagram sent
    pub fn datagram_sent(&self, byte_count: u64) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram received
    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checksum_mismatch(&self) {
        self.checksum_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate_dropped(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retransmission(&self) {
        self.retransmissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ack_sent(&self) {
        self.acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_reassembled(&self) {
        self.messages_reassembled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transform_fallback(&self) {
        self.transform_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn size_mismatch(&self) {
        self.size_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnect_requested(&self) {
        self.reconnects_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn socket_error(&self) {
        self.socket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            retransmissions: self.retransmissions.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            messages_reassembled: self.messages_reassembled.load(Ordering::Relaxed),
            transform_fallbacks: self.transform_fallbacks.load(Ordering::Relaxed),
            size_mismatches: self.size_mismatches.load(Ordering::Relaxed),
            reconnects_requested: self.reconnects_requested.load(Ordering::Relaxed),
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            datagrams_sent = snapshot.datagrams_sent,
            datagrams_received = snapshot.datagrams_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            decode_failures = snapshot.decode_failures,
            checksum_mismatches = snapshot.checksum_mismatches,
            duplicates_dropped = snapshot.duplicates_dropped,
            retransmissions = snapshot.retransmissions,
            acks_sent = snapshot.acks_sent,
            messages_reassembled = snapshot.messages_reassembled,
            transform_fallbacks = snapshot.transform_fallbacks,
            size_mismatches = snapshot.size_mismatches,
            reconnects_requested = snapshot.reconnects_requested,
            socket_errors = snapshot.socket_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub decode_failures: u64,
    pub checksum_mismatches: u64,
    pub duplicates_dropped: u64,
    pub retransmissions: u64,
    pub acks_sent: u64,
    pub messages_reassembled: u64,
    pub transform_fallbacks: u64,
    pub size_mismatches: u64,
    pub reconnects_requested: u64,
    pub socket_errors: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
