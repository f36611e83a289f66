//! Interrupt hook between the signal layer and the table.
//!
//! The table polls these flags on every state transition and before every
//! request it sends, so a request is honored between two channel operations
//! and never preempts one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Flags {
    shutdown: AtomicBool,
    stop: AtomicBool,
}

/// Cloneable handle for asking a running table to end.
///
/// ```
/// use blackjack_rs::control::TableControl;
///
/// let control = TableControl::new();
/// let from_signal_thread = control.clone();
/// from_signal_thread.request_shutdown();
/// assert!(control.shutdown_requested());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableControl {
    flags: Arc<Flags>,
}

impl TableControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close every seat and terminate at the next check.
    pub fn request_shutdown(&self) {
        self.flags.shutdown.store(true, Ordering::SeqCst);
    }

    /// Soft stop: ignored while any seat is still playing.
    pub fn request_stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.flags.shutdown.load(Ordering::SeqCst)
    }

    /// Read and clear a pending stop request.
    pub(crate) fn take_stop(&self) -> bool {
        self.flags.stop.swap(false, Ordering::SeqCst)
    }

    /// Clear both flags, e.g. before starting a new game.
    pub fn reset(&self) {
        self.flags.shutdown.store(false, Ordering::SeqCst);
        self.flags.stop.store(false, Ordering::SeqCst);
    }
}
