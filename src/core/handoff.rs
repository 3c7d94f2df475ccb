//! Single-slot, backpressured handoff of completed windows.
//!
//! Exactly one producer context (the sensor collector) fills the live
//! [`WindowBuffer`] and exactly one consumer context (the inference loop)
//! receives copies of completed windows.
//!
//! ```text
//!  collector thread                          consumer thread
//!  ────────────────                          ───────────────
//!  lock producer ─▶ append ─▶ Full?
//!                              │ stage copy
//!                              │ signal window-ready ─────▶ wake
//!                              │ wait buffer-free           copy staged window
//!                              ◀──────────────────────────  signal buffer-free
//!  unlock producer
//! ```
//!
//! The producer lock is held while waiting, so appends for the other sensor
//! cannot touch the buffer until the consumer has taken its copy. At most one
//! window is ever in flight.

use crate::collector::types::Sample;
use crate::core::window::{Window, WindowBuffer, WindowStatus};
use std::sync::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

/// Errors returned by blocking handoff operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// The pipeline is shutting down.
    #[error("window handoff cancelled")]
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    staged: Window,
    ready: bool,
    cancelled: bool,
    produced: u64,
}

/// Single-slot producer/consumer channel for windows.
#[derive(Debug)]
pub struct Handoff {
    producer: Mutex<WindowBuffer>,
    slot: Mutex<Slot>,
    window_ready: Condvar,
    buffer_free: Condvar,
}

impl Handoff {
    pub fn new(window_size: usize) -> Self {
        Self {
            producer: Mutex::new(WindowBuffer::new(window_size)),
            slot: Mutex::new(Slot {
                staged: Window::new(window_size),
                ready: false,
                cancelled: false,
                produced: 0,
            }),
            window_ready: Condvar::new(),
            buffer_free: Condvar::new(),
        }
    }

    /// Append a sample to the live window under the producer lock.
    ///
    /// When the sample completes the window, the window is handed to the
    /// consumer and this call blocks until the consumer has copied it.
    pub fn append(&self, sample: &Sample) -> Result<WindowStatus, HandoffError> {
        if self.is_cancelled() {
            return Err(HandoffError::Cancelled);
        }
        let mut buffer = lock(&self.producer);
        let status = buffer.append_sample(sample);
        if status == WindowStatus::Full {
            self.publish(buffer.window())?;
        }
        Ok(status)
    }

    /// Hand a complete window to the consumer and wait until it has been copied.
    pub fn produce(&self, window: &Window) -> Result<(), HandoffError> {
        let _producer = lock(&self.producer);
        self.publish(window)
    }

    /// Wait for the next window and return a copy of it.
    pub fn consume(&self) -> Result<Window, HandoffError> {
        let mut slot = self.wait_ready()?;
        let window = slot.staged.clone();
        self.release(&mut slot);
        Ok(window)
    }

    /// Like [`Handoff::consume`], copying into a caller-owned window.
    ///
    /// `out` is resized to the pipeline's window length if needed.
    pub fn consume_into(&self, out: &mut Window) -> Result<(), HandoffError> {
        let mut slot = self.wait_ready()?;
        if out.len() != slot.staged.len() {
            *out = Window::new(slot.staged.size());
        }
        out.as_mut_slice().copy_from_slice(slot.staged.as_slice());
        self.release(&mut slot);
        Ok(())
    }

    /// Wake and fail every blocked producer and consumer.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.cancelled = true;
        self.window_ready.notify_all();
        self.buffer_free.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.slot).cancelled
    }

    /// Clear cancellation and discard any partial or staged window.
    pub fn reset(&self) {
        let mut buffer = lock(&self.producer);
        buffer.clear();
        let mut slot = lock(&self.slot);
        slot.cancelled = false;
        slot.ready = false;
        slot.staged.clear();
    }

    /// Total windows handed to the consumer since creation.
    pub fn produced(&self) -> u64 {
        lock(&self.slot).produced
    }

    /// Stage a copy of `window`, signal the consumer, and wait until it is taken.
    /// Callers must hold the producer lock.
    fn publish(&self, window: &Window) -> Result<(), HandoffError> {
        let mut slot = lock(&self.slot);
        if slot.cancelled {
            return Err(HandoffError::Cancelled);
        }

        if slot.staged.len() != window.len() {
            slot.staged = Window::new(window.size());
        }
        slot.staged.as_mut_slice().copy_from_slice(window.as_slice());
        slot.ready = true;
        slot.produced += 1;
        self.window_ready.notify_one();

        while slot.ready && !slot.cancelled {
            slot = wait(&self.buffer_free, slot);
        }

        if slot.ready {
            // Cancelled before the consumer took it; drop the whole window.
            slot.ready = false;
            return Err(HandoffError::Cancelled);
        }
        Ok(())
    }

    fn wait_ready(&self) -> Result<MutexGuard<'_, Slot>, HandoffError> {
        let mut slot = lock(&self.slot);
        while !slot.ready && !slot.cancelled {
            slot = wait(&self.window_ready, slot);
        }
        if slot.cancelled {
            return Err(HandoffError::Cancelled);
        }
        Ok(slot)
    }

    fn release(&self, slot: &mut MutexGuard<'_, Slot>) {
        slot.ready = false;
        self.buffer_free.notify_one();
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar
        .wait(guard)
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
