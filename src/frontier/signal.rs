//! Wake-up signal for blocked dequeuers
//!
//! The signal is separate from the scheduling lock. It carries a generation
//! number so a dequeuer that observed an empty queue can tell whether any
//! producer has signalled since, which rules out missed wake-ups between
//! releasing the scheduling lock and starting to wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub(crate) struct WakeSignal {
    generation: Mutex<u64>,
    condvar: Condvar,
}

impl WakeSignal {
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current generation; read it while holding the scheduling lock
    pub(crate) fn generation(&self) -> u64 {
        *self.lock()
    }

    /// Advances the generation and wakes every waiter
    pub(crate) fn notify_all(&self) {
        let mut generation = self.lock();
        *generation = generation.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Blocks until the generation moves past `seen` or `finished` is set
    ///
    /// Spurious wake-ups are absorbed here; callers still re-check their
    /// own state after returning.
    pub(crate) fn wait_past(&self, seen: u64, finished: &AtomicBool) {
        let mut generation = self.lock();
        while *generation == seen && !finished.load(Ordering::Acquire) {
            generation = self
                .condvar
                .wait(generation)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
