//! Replay lifecycle events published on the `EventBus`.

use std::time::Duration;
use uuid::Uuid;

use super::role::Role;
use super::scheduler::RunOutcome;

/// Worker thread picked up a run.
#[derive(Clone, Debug)]
pub struct ReplayStartedEvent {
    pub run_id: Uuid,
    pub len: usize,
    pub per_item_delay: Duration,
}

/// Consumer accepted item `index`.
#[derive(Clone, Debug)]
pub struct ItemEmittedEvent {
    pub run_id: Uuid,
    pub index: usize,
    pub role: Role,
}

/// Run state has been finalized.
#[derive(Clone, Debug)]
pub struct ReplayFinishedEvent {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
}
