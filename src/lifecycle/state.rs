//! Server lifecycle state.
//!
//! A server moves NotStarted → Running → Stopped exactly once. Shutdown
//! requested before start skips Running entirely.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};

/// Lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted = 0,
    Running = 1,
    Stopped = 2,
}

impl From<u8> for ServerState {
    fn from(val: u8) -> Self {
        match val {
            1 => ServerState::Running,
            2 => ServerState::Stopped,
            _ => ServerState::NotStarted,
        }
    }
}

/// Shared state flag plus the shutdown channel it drives.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<AtomicU8>,
    shutdown: Shutdown,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ServerState::NotStarted as u8)),
            shutdown: Shutdown::new(),
        }
    }

    pub fn state(&self) -> ServerState {
        self.state.load(Ordering::SeqCst).into()
    }

    /// NotStarted → Running. Returns false if the server was already started or stopped.
    pub fn start(&self) -> bool {
        self.state
            .compare_exchange(
                ServerState::NotStarted as u8,
                ServerState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Request shutdown. Returns false if shutdown was already requested.
    pub fn request_stop(&self) -> bool {
        if !self.shutdown.trigger() {
            return false;
        }
        // A server that never ran has nothing to drain.
        let _ = self.state.compare_exchange(
            ServerState::NotStarted as u8,
            ServerState::Stopped as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        true
    }

    /// Mark the drain as finished.
    pub fn finish(&self) {
        self.state.store(ServerState::Stopped as u8, Ordering::SeqCst);
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        self.shutdown.subscribe()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
