//! seqplay - bounded-duration sequence playback
//!
//! Replays a finite, ordered sequence to a consumer on a background thread,
//! spacing items so the run fits a target duration and tagging each one as
//! first, middle or last.

// Replay engine (pacing, run state, scheduler)
pub mod core;

// Ambient modules
pub mod cli;
pub mod config;
pub mod error;

// Re-export commonly used types from core
pub use crate::core::consumer::{ChannelConsumer, Consumer, Emission, channel, fallible};
pub use crate::core::event_bus::{BoxedEvent, EventBus, EventEmitter, downcast_event};
pub use crate::core::pacing::Pacing;
pub use crate::core::replay_events::{ItemEmittedEvent, ReplayFinishedEvent, ReplayStartedEvent};
pub use crate::core::role::Role;
pub use crate::core::run_state::{PlaybackRunState, ReadinessGate, ReadyFlag};
pub use crate::core::scheduler::{ReplayHandle, ReplayScheduler, RunOutcome};

pub use config::{ReplayConfig, StartPolicy};
pub use error::{ConsumerError, ReplayError};
