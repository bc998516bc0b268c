//! Per-item delay computation.
//!
//! Bounded pacing spreads a run over a target total duration using one
//! uniform delay: `round(total / N)` milliseconds, or [`MIN_DELAY`] for an
//! empty sequence. The delay follows every emission, the last one included,
//! so a completed run lasts about `N * delay`. With few items the rounding can
//! push that past the target (N=3 over 5000 ms gives 3 x 1667 = 5001 ms).
//!
//! Fixed pacing ignores N and waits the same amount after every item.

use std::time::Duration;

use crate::error::ReplayError;

/// Delay used when there is nothing to divide by.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// How the per-item delay of a run is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Spread the whole sequence over this total duration.
    Bounded(Duration),
    /// Wait this long after every item, whatever the sequence length.
    FixedPerItem(Duration),
}

impl Pacing {
    /// Reject configurations that cannot produce a run.
    pub fn validate(&self) -> Result<(), ReplayError> {
        match self {
            Pacing::Bounded(total) if total.is_zero() => Err(ReplayError::InvalidDuration),
            _ => Ok(()),
        }
    }

    /// Delay inserted after each of `len` items.
    pub fn per_item_delay(&self, len: usize) -> Duration {
        match *self {
            Pacing::Bounded(total) => bounded_delay(total, len),
            Pacing::FixedPerItem(delay) => delay,
        }
    }

    /// Wall-clock length of a completed run over `len` items.
    pub fn expected_total(&self, len: usize) -> Duration {
        let count = u32::try_from(len).unwrap_or(u32::MAX);
        self.per_item_delay(len).saturating_mul(count)
    }
}

/// `round(total / len)` at millisecond resolution, halves rounded up.
pub fn bounded_delay(total: Duration, len: usize) -> Duration {
    if len == 0 {
        return MIN_DELAY;
    }
    // Round from microseconds so a sub-millisecond remainder still counts
    let len = len as u128;
    let ms = (total.as_micros() + len * 500) / (len * 1000);
    Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence_uses_minimum() {
        assert_eq!(bounded_delay(Duration::from_secs(5), 0), MIN_DELAY);
    }

    #[test]
    fn test_rounds_to_nearest_ms() {
        // 5000 / 3 = 1666.67
        assert_eq!(
            bounded_delay(Duration::from_millis(5000), 3),
            Duration::from_millis(1667)
        );
        // 5000 / 6 = 833.33
        assert_eq!(
            bounded_delay(Duration::from_millis(5000), 6),
            Duration::from_millis(833)
        );
        // 5 / 2 = 2.5, half rounds up
        assert_eq!(bounded_delay(Duration::from_millis(5), 2), Duration::from_millis(3));
    }

    #[test]
    fn test_sub_millisecond_target_rounds() {
        assert_eq!(
            bounded_delay(Duration::from_micros(1500), 1),
            Duration::from_millis(2)
        );
        assert_eq!(
            bounded_delay(Duration::from_micros(1499), 1),
            Duration::from_millis(1)
        );
        // 2501 us / 2 = 1250.5 us
        assert_eq!(
            bounded_delay(Duration::from_micros(2501), 2),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_total_is_n_times_delay_not_target() {
        let pacing = Pacing::Bounded(Duration::from_millis(5000));
        assert_eq!(pacing.expected_total(3), Duration::from_millis(5001));
        assert_eq!(pacing.expected_total(4), Duration::from_millis(5000));
    }

    #[test]
    fn test_fixed_ignores_length() {
        let pacing = Pacing::FixedPerItem(Duration::from_millis(400));
        assert_eq!(pacing.per_item_delay(1), Duration::from_millis(400));
        assert_eq!(pacing.per_item_delay(1000), Duration::from_millis(400));
        assert_eq!(pacing.expected_total(10), Duration::from_millis(4000));
    }

    #[test]
    fn test_zero_bounded_duration_rejected() {
        assert!(matches!(
            Pacing::Bounded(Duration::ZERO).validate(),
            Err(ReplayError::InvalidDuration)
        ));
        assert!(Pacing::FixedPerItem(Duration::ZERO).validate().is_ok());
    }
}
