//! Debounce filter for repeated notifications of the same offer.
//!
//! The foreign app re-renders an offer card many times per second. An offer
//! is only acted on when its `(rate, trip distance)` key differs from the
//! last one, or when the same key shows up again after the debounce window.

use chrono::{DateTime, Duration, Utc};

use farewatch_core::state::EngineState;
use farewatch_core::types::Offer;

/// Default debounce window.
pub const DEBOUNCE_WINDOW_MS: i64 = 5000;

/// Novelty filter backed by the shared [`EngineState`].
#[derive(Debug, Clone)]
pub struct NoveltyFilter {
    state: EngineState,
    window: Duration,
}

impl NoveltyFilter {
    pub fn new(state: EngineState) -> Self {
        Self::with_window(state, Duration::milliseconds(DEBOUNCE_WINDOW_MS))
    }

    pub fn with_window(state: EngineState, window: Duration) -> Self {
        Self { state, window }
    }

    /// Whether `offer` should be acted on at `now`.
    ///
    /// Returns `false` for a repeat of the last key seen less than the window
    /// ago. Otherwise records the key and time and returns `true`.
    pub fn is_novel(&self, offer: &Offer, now: DateTime<Utc>) -> bool {
        let key = offer.novelty_key();
        let novel = self.state.observe(key, now, self.window);
        if !novel {
            tracing::trace!(
                rate = key.rate_per_distance,
                trip = key.trip_distance,
                "Repeat offer within debounce window"
            );
        }
        novel
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(rate: f64, pickup: f64, trip: f64) -> Offer {
        Offer {
            total_fare: 20.0,
            rate_per_distance: rate,
            pickup_distance: pickup,
            trip_distance: trip,
            raw_text: String::new(),
        }
    }

    fn at(base: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
        base + Duration::milliseconds(ms)
    }

    #[test]
    fn test_first_offer_is_novel() {
        let filter = NoveltyFilter::new(EngineState::new());
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), Utc::now()));
    }

    #[test]
    fn test_repeat_within_window_is_not_novel() {
        let filter = NoveltyFilter::new(EngineState::new());
        let t0 = Utc::now();
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), t0));
        assert!(!filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, 100)));
        assert!(!filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, 4999)));
    }

    #[test]
    fn test_repeat_after_window_is_novel_again() {
        let filter = NoveltyFilter::new(EngineState::new());
        let t0 = Utc::now();
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), t0));
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, 5000)));
        // The window restarts from the re-evaluation.
        assert!(!filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, 9000)));
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, 10_000)));
    }

    #[test]
    fn test_repeats_do_not_extend_the_window() {
        let filter = NoveltyFilter::new(EngineState::new());
        let t0 = Utc::now();
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), t0));
        for ms in (500..5000).step_by(500) {
            assert!(!filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, ms)));
        }
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, 5000)));
    }

    #[test]
    fn test_different_key_is_novel_immediately() {
        let filter = NoveltyFilter::new(EngineState::new());
        let t0 = Utc::now();
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), t0));
        assert!(filter.is_novel(&offer(3.1, 2.5, 5.0), at(t0, 10)));
        assert!(filter.is_novel(&offer(3.1, 2.5, 6.0), at(t0, 20)));
        // Switching back counts as new: only the last key is remembered.
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), at(t0, 30)));
    }

    #[test]
    fn test_pickup_and_fare_are_not_part_of_identity() {
        let filter = NoveltyFilter::new(EngineState::new());
        let t0 = Utc::now();
        assert!(filter.is_novel(&offer(3.0, 2.5, 5.0), t0));
        let mut moved = offer(3.0, 1.9, 5.0);
        moved.total_fare = 99.0;
        assert!(!filter.is_novel(&moved, at(t0, 1000)));
    }

    #[test]
    fn test_filters_sharing_state_see_each_other() {
        let state = EngineState::new();
        let a = NoveltyFilter::new(state.clone());
        let b = NoveltyFilter::new(state);
        let t0 = Utc::now();
        assert!(a.is_novel(&offer(2.0, 1.0, 3.0), t0));
        assert!(!b.is_novel(&offer(2.0, 1.0, 3.0), at(t0, 1)));
    }

    #[test]
    fn test_reset_forgets_last_offer() {
        let state = EngineState::new();
        let filter = NoveltyFilter::new(state.clone());
        let t0 = Utc::now();
        assert!(filter.is_novel(&offer(2.0, 1.0, 3.0), t0));
        state.reset();
        assert!(filter.is_novel(&offer(2.0, 1.0, 3.0), at(t0, 1)));
    }

    #[test]
    fn test_custom_window() {
        let filter = NoveltyFilter::with_window(EngineState::new(), Duration::milliseconds(200));
        let t0 = Utc::now();
        assert!(filter.is_novel(&offer(2.0, 1.0, 3.0), t0));
        assert!(!filter.is_novel(&offer(2.0, 1.0, 3.0), at(t0, 199)));
        assert!(filter.is_novel(&offer(2.0, 1.0, 3.0), at(t0, 200)));
        assert_eq!(filter.window(), Duration::milliseconds(200));
    }
}
