//! Replay scheduler: paced, role-tagged playback of a finite sequence.
//!
//! **Model**: one dedicated worker thread per run. The worker hands each item
//! to the consumer, then waits for the per-item delay. The wait is the only
//! suspension point and it is interruptible: it selects on the run's cancel
//! channel with the delay as timeout.
//!
//! ```text
//! start_playback ──spawn──▶ worker: for item in sequence {
//!                                     consumer.accept(item, role)
//!                                     select { cancel => stop, after(delay) => next }
//!                                   }
//!                                   RunGuard drop: running=false, ready=false
//!                                   ReplayFinishedEvent, outcome → ReplayHandle
//! ```
//!
//! **Finalization**: `RunGuard` flips the run state in `Drop`, so it happens
//! exactly once on every exit path: completion, cancellation, consumer error
//! or an unexpected panic in the worker.
//!
//! **Start policy**: a start request while a run is active is either refused
//! (`StartPolicy::Reject`) or replaces the active run (`StartPolicy::Replace`:
//! cancel it, wait until it is finalized, then start). Starts are serialized
//! by a mutex, so both policies are deterministic. The mutex is never held
//! while waiting on a worker, since the worker may call back into the
//! scheduler from a consumer or an event subscriber.
//!
//! **Re-entrant starts**: a `ReplayFinishedEvent` subscriber runs on the
//! finished run's worker after finalization and may start the next run.
//! A start from inside a still running consumer cannot replace its own run
//! and fails with `ReplayError::ReentrantStart`.
//!
//! Dropping the scheduler cancels the active run; the `ReplayHandle` still
//! reports its outcome.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use log::{debug, error, info, trace, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;
use uuid::Uuid;

use super::consumer::Consumer;
use super::event_bus::EventEmitter;
use super::pacing::Pacing;
use super::replay_events::{ItemEmittedEvent, ReplayFinishedEvent, ReplayStartedEvent};
use super::role::Role;
use super::run_state::{PlaybackRunState, ReadinessGate};
use crate::config::{ReplayConfig, StartPolicy};
use crate::error::{ConsumerError, ReplayError};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every item was emitted.
    Completed { emitted: usize },
    /// Cancelled before the sequence was exhausted.
    Cancelled { emitted: usize },
    /// The consumer failed; `emitted` counts the items it accepted.
    Failed { emitted: usize, error: ConsumerError },
}

impl RunOutcome {
    pub fn emitted(&self) -> usize {
        match self {
            RunOutcome::Completed { emitted }
            | RunOutcome::Cancelled { emitted }
            | RunOutcome::Failed { emitted, .. } => *emitted,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled { .. })
    }
}

/// Caller's handle on one run.
#[derive(Debug)]
pub struct ReplayHandle {
    id: Uuid,
    cancel: Sender<()>,
    done: Receiver<RunOutcome>,
    outcome: Option<RunOutcome>,
    state: Arc<PlaybackRunState>,
}

impl ReplayHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the run to stop. Idempotent; no effect once the run has ended.
    pub fn cancel(&self) {
        let _ = self.cancel.try_send(());
    }

    /// Outcome if the run has ended, without blocking.
    pub fn try_outcome(&mut self) -> Option<RunOutcome> {
        if self.outcome.is_none() {
            self.outcome = match self.done.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(self.lost_outcome()),
            };
        }
        self.outcome.clone()
    }

    /// True once the outcome is available.
    pub fn is_finished(&mut self) -> bool {
        self.try_outcome().is_some()
    }

    /// Block up to `timeout` for the outcome.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<RunOutcome> {
        if self.outcome.is_none() {
            self.outcome = match self.done.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => None,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    Some(self.lost_outcome())
                }
            };
        }
        self.outcome.clone()
    }

    /// Block until the run has been finalized.
    pub fn wait(mut self) -> RunOutcome {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        self.done.recv().unwrap_or_else(|_| self.lost_outcome())
    }

    // Worker died without reporting (panic outside the consumer)
    fn lost_outcome(&self) -> RunOutcome {
        RunOutcome::Failed {
            emitted: self.state.emitted(),
            error: ConsumerError::Panicked("replay worker terminated".to_string()),
        }
    }
}

struct ActiveRun {
    id: Uuid,
    cancel: Sender<()>,
    /// Disconnects when the run's `RunGuard` has finalized the state.
    finalized: Receiver<()>,
    worker: ThreadId,
}

/// Paces a sequence to a consumer on a background thread.
///
/// # Example
/// ```ignore
/// let scheduler = ReplayScheduler::new();
/// let handle = scheduler.start_playback(points, Duration::from_secs(5), |p, role| {
///     markers.place(p, role);
/// })?;
/// assert!(scheduler.is_running());
/// let outcome = handle.wait();
/// ```
pub struct ReplayScheduler {
    config: ReplayConfig,
    state: Arc<PlaybackRunState>,
    gate: Option<Arc<dyn ReadinessGate>>,
    events: EventEmitter,
    active: Mutex<Option<ActiveRun>>,
}

impl Default for ReplayScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayScheduler {
    pub fn new() -> Self {
        Self::with_config(ReplayConfig::default())
    }

    pub fn with_config(config: ReplayConfig) -> Self {
        Self {
            config,
            state: Arc::new(PlaybackRunState::new()),
            gate: None,
            events: EventEmitter::detached(),
            active: Mutex::new(None),
        }
    }

    /// External readiness gate, cleared at the end of every run.
    pub fn with_gate(mut self, gate: Arc<dyn ReadinessGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Publish lifecycle events through `emitter`.
    pub fn with_events(mut self, emitter: EventEmitter) -> Self {
        self.events = emitter;
        self
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Shared run state, for observers on other threads.
    pub fn state(&self) -> Arc<PlaybackRunState> {
        Arc::clone(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Replay `sequence` spread over `target_total`, calling `emit` on the
    /// worker thread for every item.
    pub fn start_playback<T, F>(
        &self,
        sequence: Vec<T>,
        target_total: Duration,
        emit: F,
    ) -> Result<ReplayHandle, ReplayError>
    where
        T: Send + 'static,
        F: FnMut(T, Role) + Send + 'static,
    {
        self.start_with(sequence, Pacing::Bounded(target_total), emit)
    }

    /// Replay `sequence` with the pacing from the scheduler's config.
    pub fn start_configured<T, C>(
        &self,
        sequence: Vec<T>,
        consumer: C,
    ) -> Result<ReplayHandle, ReplayError>
    where
        T: Send + 'static,
        C: Consumer<T> + 'static,
    {
        self.start_with(sequence, self.config.pacing(), consumer)
    }

    /// Replay `sequence` with an explicit pacing mode.
    pub fn start_with<T, C>(
        &self,
        sequence: Vec<T>,
        pacing: Pacing,
        consumer: C,
    ) -> Result<ReplayHandle, ReplayError>
    where
        T: Send + 'static,
        C: Consumer<T> + 'static,
    {
        pacing.validate()?;

        let mut active = self.lock_active();
        loop {
            let finalized = match active.as_ref() {
                Some(prev) if self.state.is_running() => match self.config.start_policy {
                    StartPolicy::Reject => {
                        warn!("Replay {} still running, start rejected", prev.id);
                        return Err(ReplayError::AlreadyRunning { run_id: prev.id });
                    }
                    StartPolicy::Replace if prev.worker == thread::current().id() => {
                        warn!("Replay {} cannot replace itself from its own worker", prev.id);
                        return Err(ReplayError::ReentrantStart { run_id: prev.id });
                    }
                    StartPolicy::Replace => {
                        debug!("Replacing replay {}", prev.id);
                        let _ = prev.cancel.try_send(());
                        prev.finalized.clone()
                    }
                },
                _ => break,
            };
            // Unlocked while waiting; a subscriber may start another run meanwhile
            drop(active);
            let _ = finalized.recv();
            active = self.lock_active();
        }

        let len = sequence.len();
        let delay = pacing.per_item_delay(len);
        if !self.state.try_begin(delay) {
            // Only reachable if the state is shared with another scheduler
            return Err(ReplayError::AlreadyRunning { run_id: Uuid::nil() });
        }

        let id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let (finalized_tx, finalized_rx) = bounded::<()>(0);
        let worker = RunWorker {
            id,
            delay,
            cancel: cancel_rx,
            state: Arc::clone(&self.state),
            gate: self.gate.clone(),
            events: self.events.clone(),
        };

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name, &id.simple().to_string()[..8]))
            .spawn(move || {
                let outcome = worker.run(sequence, consumer, finalized_tx);
                let _ = done_tx.send(outcome);
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.state.abort_begin();
                error!("Failed to spawn replay worker: {}", e);
                return Err(ReplayError::Spawn(e));
            }
        };

        debug!("Replay {} started: {} items, {:?} per item", id, len, delay);
        // Workers are detached; completion is tracked through `finalized`
        *active = Some(ActiveRun {
            id,
            cancel: cancel_tx.clone(),
            finalized: finalized_rx,
            worker: thread.thread().id(),
        });

        Ok(ReplayHandle {
            id,
            cancel: cancel_tx,
            done: done_rx,
            outcome: None,
            state: Arc::clone(&self.state),
        })
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancel the active run. Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        let active = self.lock_active();
        match active.as_ref() {
            Some(run) if self.state.is_running() => {
                debug!("Cancelling replay {}", run.id);
                let _ = run.cancel.try_send(());
                true
            }
            _ => false,
        }
    }
}

impl Drop for ReplayScheduler {
    fn drop(&mut self) {
        let active = self.active.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(run) = active.take()
            && self.state.is_running()
        {
            debug!("Scheduler dropped, cancelling replay {}", run.id);
            let _ = run.cancel.try_send(());
        }
    }
}

/// Everything the worker thread owns for one run.
struct RunWorker {
    id: Uuid,
    delay: Duration,
    cancel: Receiver<()>,
    state: Arc<PlaybackRunState>,
    gate: Option<Arc<dyn ReadinessGate>>,
    events: EventEmitter,
}

impl RunWorker {
    fn run<T, C: Consumer<T>>(
        self,
        sequence: Vec<T>,
        consumer: C,
        finalized: Sender<()>,
    ) -> RunOutcome {
        let len = sequence.len();
        self.events.emit(ReplayStartedEvent {
            run_id: self.id,
            len,
            per_item_delay: self.delay,
        });

        let outcome = {
            let mut guard = RunGuard {
                state: &self.state,
                gate: self.gate.as_deref(),
                cancelled: false,
                _finalized: finalized,
            };
            let outcome = self.play(sequence, consumer);
            guard.cancelled = outcome.is_cancelled();
            outcome
        };

        match &outcome {
            RunOutcome::Completed { emitted } => {
                info!("Replay {} completed ({} items)", self.id, emitted)
            }
            RunOutcome::Cancelled { emitted } => {
                info!("Replay {} cancelled after {} of {} items", self.id, emitted, len)
            }
            RunOutcome::Failed { emitted, error } => {
                error!("Replay {} failed after {} items: {}", self.id, emitted, error)
            }
        }
        self.events.emit(ReplayFinishedEvent {
            run_id: self.id,
            outcome: outcome.clone(),
        });
        outcome
    }

    fn play<T, C: Consumer<T>>(&self, sequence: Vec<T>, mut consumer: C) -> RunOutcome {
        let len = sequence.len();
        for (idx, item) in sequence.into_iter().enumerate() {
            // Cancel may arrive before the first item or while the consumer ran
            if !matches!(self.cancel.try_recv(), Err(TryRecvError::Empty)) {
                return RunOutcome::Cancelled { emitted: idx };
            }

            let role = Role::classify(idx, len);
            trace!("Replay {}: item {}/{} ({})", self.id, idx + 1, len, role);

            let accepted = panic::catch_unwind(AssertUnwindSafe(|| consumer.accept(item, role)))
                .unwrap_or_else(|payload| Err(ConsumerError::Panicked(panic_message(&*payload))));
            if let Err(error) = accepted {
                return RunOutcome::Failed {
                    emitted: idx,
                    error,
                };
            }

            self.state.record_emission();
            self.events.emit(ItemEmittedEvent {
                run_id: self.id,
                index: idx,
                role,
            });

            select! {
                recv(self.cancel) -> _ => return RunOutcome::Cancelled { emitted: idx + 1 },
                default(self.delay) => {}
            }
        }
        RunOutcome::Completed { emitted: len }
    }
}

/// Finalizes the run state when dropped.
struct RunGuard<'a> {
    state: &'a PlaybackRunState,
    gate: Option<&'a dyn ReadinessGate>,
    cancelled: bool,
    // Dropped after `drop` runs, which wakes a pending `Replace`
    _finalized: Sender<()>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(gate) = self.gate {
            gate.set_ready(false);
        }
        self.state.finish(self.cancelled);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
