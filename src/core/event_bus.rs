//! Pub/Sub event bus for replay lifecycle notifications.
//!
//! The replay worker publishes `ReplayStartedEvent`, `ItemEmittedEvent` and
//! `ReplayFinishedEvent` (see `replay_events`). Hosts observe them two ways:
//! - `subscribe()`: callback runs immediately, on the publishing thread
//! - `poll()`: events are also queued and drained in the host's own loop
//!
//! Callback order: FIFO within one event type. No ordering across types.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Queue bound; the oldest half is dropped when it fills up
const MAX_QUEUE_SIZE: usize = 1000;

/// Anything that can travel on the bus.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Queued event, recovered with [`downcast_event`].
pub type BoxedEvent = Box<dyn Event>;

#[derive(Default)]
struct Inner {
    subscribers: RwLock<HashMap<TypeId, Vec<Callback>>>,
    queue: Mutex<Vec<BoxedEvent>>,
}

impl Inner {
    fn publish<E: Event>(&self, event: E) {
        let type_id = TypeId::of::<E>();

        // Clone the list so callbacks may subscribe without deadlocking
        let callbacks = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
            .cloned();
        for cb in callbacks.iter().flatten() {
            cb(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!(
                "Replay event queue full ({} events), evicting oldest {}",
                queue.len(),
                evict_count
            );
            queue.drain(0..evict_count);
        }
        queue.push(Box::new(event));
    }
}

/// Owning side of the bus: subscribe, poll, hand out emitters.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type `E`.
    ///
    /// The callback runs on whichever thread publishes, usually the replay
    /// worker. Keep it short; a slow callback delays the next emission.
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    /// Publish from the owning side.
    pub fn emit<E: Event>(&self, event: E) {
        self.inner.publish(event);
    }

    /// Drain everything published since the last poll.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Publishing handle for the scheduler.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            inner: Some(Arc::clone(&self.inner)),
        }
    }

    pub fn unsubscribe_all<E: Event>(&self) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&TypeId::of::<E>());
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .is_some_and(|v| !v.is_empty())
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Publishing handle; a detached emitter drops everything.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Option<Arc<Inner>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("attached", &self.inner.is_some())
            .finish()
    }
}

impl EventEmitter {
    /// Emitter not connected to any bus (scheduler default)
    pub fn detached() -> Self {
        Self { inner: None }
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    pub fn emit<E: Event>(&self, event: E) {
        if let Some(inner) = &self.inner {
            inner.publish(event);
        }
    }
}

/// Downcast a queued event to its concrete type.
///
/// Derefs to `dyn Event` first: calling `as_any()` on the `Box` itself would
/// hit the blanket impl for `Box<dyn Event>` and the downcast would fail.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug)]
    struct Tick(usize);

    #[derive(Clone, Debug)]
    struct Done;

    #[test]
    fn test_subscriber_runs_immediately() {
        let bus = EventBus::new();
        let total = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&total);
        bus.subscribe::<Tick, _>(move |e| {
            t.fetch_add(e.0, Ordering::SeqCst);
        });

        bus.emit(Tick(3));
        bus.emit(Tick(4));
        assert_eq!(total.load(Ordering::SeqCst), 7);
        assert!(bus.has_subscribers::<Tick>());
        assert!(!bus.has_subscribers::<Done>());
    }

    #[test]
    fn test_emitter_queues_for_poll() {
        let bus = EventBus::new();
        let emitter = bus.emitter();
        emitter.emit(Tick(1));
        emitter.emit(Done);

        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(downcast_event::<Tick>(&events[0]).map(|t| t.0), Some(1));
        assert!(downcast_event::<Done>(&events[1]).is_some());
        assert!(downcast_event::<Tick>(&events[1]).is_none());
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_detached_emitter_is_silent() {
        let emitter = EventEmitter::detached();
        assert!(!emitter.is_attached());
        emitter.emit(Done);
    }

    #[test]
    fn test_unsubscribe_keeps_queueing() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe::<Done, _>(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(Done);
        bus.unsubscribe_all::<Done>();
        bus.emit(Done);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.poll().len(), 2);
    }

    #[test]
    fn test_queue_evicts_oldest_half() {
        let bus = EventBus::new();
        for i in 0..MAX_QUEUE_SIZE + 1 {
            bus.emit(Tick(i));
        }
        let events = bus.poll();
        assert_eq!(events.len(), MAX_QUEUE_SIZE / 2 + 1);
        assert_eq!(
            downcast_event::<Tick>(&events[0]).map(|t| t.0),
            Some(MAX_QUEUE_SIZE / 2)
        );
    }
}
