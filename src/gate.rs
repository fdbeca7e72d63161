//! Initialization gate
//!
//! One-way latch ensuring the `get_initial_context` handshake completes
//! before any other tool runs. Starts closed, opens exactly once per process
//! lifetime, and never closes itself; `reset` exists for test isolation only.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{Error, Result};

/// Tool name that bypasses (and ultimately opens) the gate
pub const INITIALIZER_TOOL: &str = "get_initial_context";

/// Process-wide initialization gate
#[derive(Debug, Default)]
pub struct InitGate {
    is_open: AtomicBool,
    opened_at: RwLock<Option<DateTime<Utc>>>,
}

impl InitGate {
    /// Create a closed gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass the initializer through unconditionally; every other tool fails
    /// with a not-initialized error while the gate is closed.
    pub fn check(&self, tool_name: &str) -> Result<()> {
        if tool_name == INITIALIZER_TOOL || self.is_open() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Open the gate. Idempotent; the first open records the timestamp.
    pub fn open(&self) {
        if !self.is_open.swap(true, Ordering::SeqCst) {
            *self.opened_at.write() = Some(Utc::now());
        }
    }

    /// Whether the handshake has completed
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    /// When the gate opened, if it has
    #[must_use]
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        *self.opened_at.read()
    }

    /// Close the gate again (test isolation only)
    pub fn reset(&self) {
        self.is_open.store(false, Ordering::SeqCst);
        *self.opened_at.write() = None;
    }
}
