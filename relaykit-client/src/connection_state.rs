//! Connection state tracking
//!
//! ```text
//! Disconnected → Connecting → Connected
//!       ↑             │            │
//!       └─────────────┴────────────┘
//! ```
//!
//! State is read synchronously from event handlers and polling loops, so it
//! lives in an atomic rather than behind an async lock. Transitions report the
//! previous state, which lets callers emit "closed" exactly once even when the
//! reader task and an explicit close race.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Socket lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Numeric value recorded by the connection-state gauge
    pub fn metric_value(self) -> i64 {
        self.as_u8() as i64
    }
}

/// Lock-free holder for a [`ConnectionState`] plus the paused flag
#[derive(Debug)]
pub struct StateTracker {
    state: AtomicU8,
    paused: AtomicBool,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            paused: AtomicBool::new(false),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Set a new state and return the previous one
    pub fn transition(&self, to: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.state.swap(to.as_u8(), Ordering::SeqCst))
    }

    /// Move `from → to` only if currently in `from`
    pub fn transition_from(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.get() == ConnectionState::Connecting
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }
}
