//! Lock-free connection state and counters shared between the worker and
//! any number of reader threads.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Connection lifecycle: Disconnected → Connecting → Connected → Disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Connection state readable from any thread, written only by the worker
#[derive(Debug)]
pub struct AtomicConnectionState {
    state: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Store `state`, returning the previous one
    #[inline]
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.state.swap(state as u8, Ordering::AcqRel))
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.get() == ConnectionState::Connecting
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ConnectionState::Disconnected
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

/// Client metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub commands_sent: u64,
    pub responses_received: u64,
    pub notifications_published: u64,
    pub unrecognized_frames: u64,
    pub commands_failed: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// Counters updated by the worker
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    commands_sent: AtomicU64,
    responses_received: AtomicU64,
    notifications_published: AtomicU64,
    unrecognized_frames: AtomicU64,
    commands_failed: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_responses(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_notifications(&self) {
        self.notifications_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_unrecognized(&self) {
        self.unrecognized_frames.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_failed(&self, count: u64) {
        self.commands_failed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, connection_state: ConnectionState) -> Metrics {
        Metrics {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            notifications_published: self.notifications_published.load(Ordering::Relaxed),
            unrecognized_frames: self.unrecognized_frames.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            reconnect_count: self.reconnect_count.load(Ordering::Relaxed),
            connection_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_state_lifecycle() {
        let state = AtomicConnectionState::default();
        assert!(state.is_disconnected());

        assert_eq!(state.set(ConnectionState::Connecting), ConnectionState::Disconnected);
        assert!(state.is_connecting());

        assert_eq!(state.set(ConnectionState::Connected), ConnectionState::Connecting);
        assert!(state.is_connected());

        assert_eq!(state.set(ConnectionState::Disconnected), ConnectionState::Connected);
        assert!(state.is_disconnected());
    }

    #[test]
    fn test_concurrent_metrics() {
        let metrics = Arc::new(AtomicMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.increment_sent();
                        m.increment_notifications();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot(ConnectionState::Connected);
        assert_eq!(snapshot.commands_sent, 4000);
        assert_eq!(snapshot.notifications_published, 4000);
        assert_eq!(snapshot.reconnect_count, 0);
        assert_eq!(snapshot.connection_state, ConnectionState::Connected);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }
}
