//! Single-flight admission gate.
//!
//! At most one operation holds the gate. Entry never waits: a caller that
//! finds it held is turned away and must report "busy" upstream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct SingleFlightGate {
    busy: Arc<AtomicBool>,
}

impl SingleFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking acquisition. `None` means another operation holds the gate.
    pub fn try_enter(&self) -> Option<GatePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GatePermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the gate. Dropping it releases the gate, so release
/// happens exactly once on every path, unwinding included. The permit is
/// `Send` and may follow work onto a blocking thread.
#[must_use = "dropping the permit releases the gate immediately"]
#[derive(Debug)]
pub struct GatePermit {
    busy: Arc<AtomicBool>,
}

impl GatePermit {
    /// Explicit release; equivalent to dropping the permit.
    pub fn exit(self) {}
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let was_held = self.busy.swap(false, Ordering::Release);
        debug_assert!(was_held, "gate released while not held");
    }
}
