//! Shared run state of a replay scheduler.
//!
//! **Writers**: the scheduler (run start) and the replay worker (emission
//! count, finalization). **Readers**: any thread, e.g. a UI polling
//! `is_running()` or a readiness gate elsewhere in the host.
//!
//! Every field is an atomic so readers never observe a torn value.

use log::trace;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// External boolean cleared when a run ends.
///
/// The host sets it when it wants a new replay; the scheduler clears it once
/// the run is over, whatever the outcome.
pub trait ReadinessGate: Send + Sync {
    fn set_ready(&self, ready: bool);
}

/// Run state shared between a scheduler, its worker and observers.
#[derive(Debug, Default)]
pub struct PlaybackRunState {
    running: AtomicBool,
    ready_for_next_run: AtomicBool,
    cancelled: AtomicBool,
    delay_us: AtomicU64,
    emitted: AtomicUsize,
    runs: AtomicU64,
}

impl PlaybackRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from run start until finalization.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_ready_for_next_run(&self) -> bool {
        self.ready_for_next_run.load(Ordering::Acquire)
    }

    /// Whether the last finished run was cancelled.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Per-item delay of the current (or last) run.
    pub fn per_item_delay(&self) -> Duration {
        Duration::from_micros(self.delay_us.load(Ordering::Acquire))
    }

    /// Items delivered to the consumer in the current (or last) run.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Acquire)
    }

    /// Number of runs started so far.
    pub fn runs_started(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Claim the state for a new run. Returns false if a run is active.
    pub(crate) fn try_begin(&self, delay: Duration) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let delay_us = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.delay_us.store(delay_us, Ordering::Release);
        self.emitted.store(0, Ordering::Release);
        self.cancelled.store(false, Ordering::Release);
        self.runs.fetch_add(1, Ordering::Relaxed);
        trace!("Run state claimed (delay {:?})", delay);
        true
    }

    /// Undo `try_begin` when the worker never started.
    pub(crate) fn abort_begin(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub(crate) fn record_emission(&self) {
        self.emitted.fetch_add(1, Ordering::AcqRel);
    }

    /// Flip the flags at run end. Called exactly once per run.
    pub(crate) fn finish(&self, cancelled: bool) {
        self.cancelled.store(cancelled, Ordering::Release);
        self.ready_for_next_run.store(false, Ordering::Release);
        self.running.store(false, Ordering::Release);
        trace!("Run state finalized (cancelled: {})", cancelled);
    }
}

impl ReadinessGate for PlaybackRunState {
    fn set_ready(&self, ready: bool) {
        self.ready_for_next_run.store(ready, Ordering::Release);
    }
}

/// Standalone readiness flag for hosts without their own gate.
#[derive(Debug, Default)]
pub struct ReadyFlag(AtomicBool);

impl ReadyFlag {
    pub fn new(ready: bool) -> Self {
        Self(AtomicBool::new(ready))
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl ReadinessGate for ReadyFlag {
    fn set_ready(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_exclusive() {
        let state = PlaybackRunState::new();
        assert!(state.try_begin(Duration::from_millis(10)));
        assert!(state.is_running());
        assert!(!state.try_begin(Duration::from_millis(20)));
        // Losing claim must not clobber the active run's delay
        assert_eq!(state.per_item_delay(), Duration::from_millis(10));
        assert_eq!(state.runs_started(), 1);
    }

    #[test]
    fn test_finish_clears_flags() {
        let state = PlaybackRunState::new();
        state.set_ready(true);
        assert!(state.try_begin(Duration::from_millis(1)));
        state.record_emission();
        state.finish(true);

        assert!(!state.is_running());
        assert!(!state.is_ready_for_next_run());
        assert!(state.was_cancelled());
        assert_eq!(state.emitted(), 1);
    }

    #[test]
    fn test_begin_resets_counters() {
        let state = PlaybackRunState::new();
        assert!(state.try_begin(Duration::from_millis(1)));
        state.record_emission();
        state.finish(true);

        assert!(state.try_begin(Duration::from_millis(1)));
        assert_eq!(state.emitted(), 0);
        assert!(!state.was_cancelled());
        assert_eq!(state.runs_started(), 2);
    }

    #[test]
    fn test_ready_flag_gate() {
        let flag = ReadyFlag::new(true);
        assert!(flag.is_ready());
        flag.set_ready(false);
        assert!(!flag.is_ready());
    }
}
