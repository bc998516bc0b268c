//! Replay engine - pacing, run state, consumers, events, scheduler
//!
//! These modules form the playback core, independent of any host UI.

pub mod consumer;
pub mod event_bus;
pub mod pacing;
pub mod replay_events;
pub mod role;
pub mod run_state;
pub mod scheduler;

// Re-exports for convenience
pub use consumer::{ChannelConsumer, Consumer, Emission};
pub use event_bus::{EventBus, EventEmitter};
pub use pacing::Pacing;
pub use role::Role;
pub use run_state::{PlaybackRunState, ReadinessGate, ReadyFlag};
pub use scheduler::{ReplayHandle, ReplayScheduler, RunOutcome};
