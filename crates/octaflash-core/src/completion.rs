//! Completion signals raised by the controller's interrupt handlers
//!
//! Each pending operation kind (DMA transfer, periodic status poll) has its
//! own single-producer/single-consumer [`CompletionSignal`]. The interrupt
//! handler is the only producer; the engine is the only consumer. A signal
//! must be cleared before the operation it reports on is started, so a late
//! completion from an earlier operation is never mistaken for the new one.

use core::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const COMPLETE: u8 = 1;
const FAILED: u8 = 2;

/// Outcome carried by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    /// The operation finished
    Complete,
    /// The hardware gave up (e.g. the poll budget ran out)
    Failed,
}

/// One-shot completion flag shared between an interrupt handler and the engine
#[derive(Debug, Default)]
pub struct CompletionSignal {
    state: AtomicU8,
}

impl CompletionSignal {
    /// Create an idle signal
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Raise the signal (producer side)
    pub fn signal(&self, completion: Completion) {
        let value = match completion {
            Completion::Complete => COMPLETE,
            Completion::Failed => FAILED,
        };
        self.state.store(value, Ordering::Release);
    }

    /// Consume a raised signal (consumer side)
    pub fn take(&self) -> Option<Completion> {
        match self.state.swap(IDLE, Ordering::AcqRel) {
            COMPLETE => Some(Completion::Complete),
            FAILED => Some(Completion::Failed),
            _ => None,
        }
    }

    /// Whether a signal is waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// Drop any pending signal; returns the discarded value
    pub fn clear(&self) -> Option<Completion> {
        self.take()
    }
}
