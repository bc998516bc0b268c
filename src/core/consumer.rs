//! Consumers of replayed items.
//!
//! A consumer is called on the replay worker thread. Consumers that must
//! run elsewhere (a UI thread, an async task) use [`channel`]: the worker
//! sends typed [`Emission`]s and the owning thread drains the receiver.
//!
//! # Example
//! ```ignore
//! let (consumer, rx) = consumer::channel();
//! let pacing = Pacing::Bounded(Duration::from_secs(5));
//! let handle = scheduler.start_with(points, pacing, consumer)?;
//!
//! // On the UI thread:
//! for emission in rx.try_iter() {
//!     if emission.role.is_first() {
//!         viewport.center_on(&emission.item);
//!     }
//!     markers.push(emission.item);
//! }
//! ```

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::role::Role;
use crate::error::ConsumerError;

/// Receives items of a run in sequence order.
pub trait Consumer<T>: Send {
    /// Handle one item. An `Err` aborts the rest of the run.
    fn accept(&mut self, item: T, role: Role) -> Result<(), ConsumerError>;
}

impl<T, F> Consumer<T> for F
where
    F: FnMut(T, Role) + Send,
{
    fn accept(&mut self, item: T, role: Role) -> Result<(), ConsumerError> {
        self(item, role);
        Ok(())
    }
}

/// Adapter for closures that can refuse an item.
pub struct Fallible<F>(pub F);

impl<T, F> Consumer<T> for Fallible<F>
where
    F: FnMut(T, Role) -> Result<(), ConsumerError> + Send,
{
    fn accept(&mut self, item: T, role: Role) -> Result<(), ConsumerError> {
        (self.0)(item, role)
    }
}

/// Wrap a fallible closure as a consumer.
pub fn fallible<T, F>(f: F) -> Fallible<F>
where
    F: FnMut(T, Role) -> Result<(), ConsumerError> + Send,
{
    Fallible(f)
}

/// Item handed across threads by [`ChannelConsumer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Emission<T> {
    /// Position in the run's sequence.
    pub index: usize,
    pub role: Role,
    pub item: T,
}

/// Forwards items to a channel owned by another thread.
#[derive(Debug)]
pub struct ChannelConsumer<T> {
    tx: Sender<Emission<T>>,
    next_index: usize,
}

impl<T> ChannelConsumer<T> {
    pub fn new(tx: Sender<Emission<T>>) -> Self {
        Self { tx, next_index: 0 }
    }
}

impl<T: Send> Consumer<T> for ChannelConsumer<T> {
    fn accept(&mut self, item: T, role: Role) -> Result<(), ConsumerError> {
        let emission = Emission {
            index: self.next_index,
            role,
            item,
        };
        self.tx
            .send(emission)
            .map_err(|_| ConsumerError::Disconnected)?;
        self.next_index += 1;
        Ok(())
    }
}

/// Unbounded channel hand-off: give the consumer to the scheduler, keep the
/// receiver on the consuming thread.
pub fn channel<T>() -> (ChannelConsumer<T>, Receiver<Emission<T>>) {
    let (tx, rx) = unbounded();
    (ChannelConsumer::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_consumer() {
        let mut seen = Vec::new();
        {
            let mut consumer = |item: i32, role: Role| seen.push((item, role));
            consumer.accept(7, Role::First).unwrap();
            consumer.accept(8, Role::Last).unwrap();
        }
        assert_eq!(seen, vec![(7, Role::First), (8, Role::Last)]);
    }

    #[test]
    fn test_fallible_consumer_propagates_error() {
        let mut consumer = fallible(|item: i32, _role| {
            if item < 0 {
                Err(ConsumerError::Rejected(format!("negative: {}", item)))
            } else {
                Ok(())
            }
        });
        assert!(consumer.accept(1, Role::First).is_ok());
        assert_eq!(
            consumer.accept(-1, Role::Middle),
            Err(ConsumerError::Rejected("negative: -1".into()))
        );
    }

    #[test]
    fn test_channel_numbers_emissions() {
        let (mut consumer, rx) = channel::<&str>();
        consumer.accept("a", Role::First).unwrap();
        consumer.accept("b", Role::Middle).unwrap();
        consumer.accept("c", Role::Last).unwrap();

        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[1], Emission { index: 1, role: Role::Middle, item: "b" });
        assert_eq!(got[2].index, 2);
    }

    #[test]
    fn test_channel_disconnected() {
        let (mut consumer, rx) = channel::<u8>();
        drop(rx);
        assert_eq!(consumer.accept(1, Role::First), Err(ConsumerError::Disconnected));
    }
}
