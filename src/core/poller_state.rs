use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const POLLING: u8 = 1;
const STOPPED: u8 = 2;

/// Guards a pipeline against overlapping polls
///
/// States:
/// - IDLE: Waiting for the next trigger
/// - POLLING: A poll is running; further polls are skipped
/// - STOPPED: The source was stopped; no further polls start
#[derive(Debug)]
pub struct PollerState {
    state: AtomicU8,
}

impl Default for PollerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Move IDLE -> POLLING
    ///
    /// Returns `None` when a poll is already running or the state is STOPPED.
    /// The returned guard moves back to IDLE when dropped.
    pub fn begin(&self) -> Option<PollGuard<'_>> {
        self.state
            .compare_exchange(IDLE, POLLING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PollGuard { state: self })
    }

    /// Refuse all future polls; a running poll completes normally
    pub fn stop(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }

    pub fn is_polling(&self) -> bool {
        self.state.load(Ordering::Acquire) == POLLING
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }

    /// Get current state as string for logging
    pub fn state_name(&self) -> &'static str {
        match self.state.load(Ordering::Acquire) {
            IDLE => "IDLE",
            POLLING => "POLLING",
            STOPPED => "STOPPED",
            _ => "UNKNOWN",
        }
    }
}

/// Held for the duration of one poll
#[derive(Debug)]
pub struct PollGuard<'a> {
    state: &'a PollerState,
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        // Leaves STOPPED untouched if stop() happened mid-poll
        let _ = self.state.state.compare_exchange(
            POLLING,
            IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}
