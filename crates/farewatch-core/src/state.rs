//! Process-wide engine state shared by the novelty filter and the tap sequencer.
//!
//! One `EngineState` is created per monitoring session and handed to every
//! component that needs it. Clones share the same underlying state. All
//! reads and writes go through a single `Mutex`, so the novelty
//! check-and-update and the in-flight guard check-and-set are each atomic
//! with respect to concurrent snapshot handling.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::types::NoveltyKey;

#[derive(Debug, Default)]
struct StateInner {
    last_novelty_key: Option<NoveltyKey>,
    last_novelty_at: Option<DateTime<Utc>>,
    sequence_in_flight: bool,
}

/// Thread-safe handle to the engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    inner: Arc<Mutex<StateInner>>,
}

impl EngineState {
    /// Create a fresh state: no offer seen, no sequence in flight.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        // The critical sections never panic, so a poisoned lock still holds
        // consistent data.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Compare `key` against the last accepted key and, unless it repeats
    /// within `window`, record it as the new last key.
    ///
    /// Returns `true` when the key was recorded (the offer is novel).
    pub fn observe(&self, key: NoveltyKey, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        let mut state = self.lock();
        if let (Some(last_key), Some(last_at)) = (state.last_novelty_key, state.last_novelty_at) {
            if last_key == key && now - last_at < window {
                return false;
            }
        }
        state.last_novelty_key = Some(key);
        state.last_novelty_at = Some(now);
        true
    }

    /// Last recorded novelty key and when it was recorded.
    pub fn last_novelty(&self) -> Option<(NoveltyKey, DateTime<Utc>)> {
        let state = self.lock();
        state.last_novelty_key.zip(state.last_novelty_at)
    }

    /// Atomically claim the in-flight guard.
    ///
    /// Returns `false` without changing anything if a sequence is already running.
    pub fn try_begin_sequence(&self) -> bool {
        let mut state = self.lock();
        if state.sequence_in_flight {
            return false;
        }
        state.sequence_in_flight = true;
        true
    }

    /// Release the in-flight guard.
    pub fn end_sequence(&self) {
        self.lock().sequence_in_flight = false;
    }

    pub fn sequence_in_flight(&self) -> bool {
        self.lock().sequence_in_flight
    }

    /// Forget the last seen offer. The in-flight guard is left alone: a
    /// running sequence still owns it and will release it itself.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.last_novelty_key = None;
        state.last_novelty_at = None;
        tracing::debug!("Engine state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(rate: f64, trip: f64) -> NoveltyKey {
        NoveltyKey {
            rate_per_distance: rate,
            trip_distance: trip,
        }
    }

    #[test]
    fn test_observe_records_first_key() {
        let state = EngineState::new();
        let now = Utc::now();
        assert!(state.observe(key(3.0, 5.0), now, Duration::milliseconds(5000)));
        assert_eq!(state.last_novelty(), Some((key(3.0, 5.0), now)));
    }

    #[test]
    fn test_observe_repeat_within_window_does_not_update() {
        let state = EngineState::new();
        let t0 = Utc::now();
        let window = Duration::milliseconds(5000);
        assert!(state.observe(key(3.0, 5.0), t0, window));
        assert!(!state.observe(key(3.0, 5.0), t0 + Duration::milliseconds(4999), window));
        // Timestamp still points at the first sighting.
        assert_eq!(state.last_novelty().unwrap().1, t0);
    }

    #[test]
    fn test_guard_is_exclusive() {
        let state = EngineState::new();
        assert!(state.try_begin_sequence());
        assert!(!state.try_begin_sequence());
        assert!(state.sequence_in_flight());
        state.end_sequence();
        assert!(!state.sequence_in_flight());
        assert!(state.try_begin_sequence());
    }

    #[test]
    fn test_clone_shares_state() {
        let a = EngineState::new();
        let b = a.clone();
        assert!(a.try_begin_sequence());
        assert!(b.sequence_in_flight());
    }

    #[test]
    fn test_reset_keeps_guard() {
        let state = EngineState::new();
        state.observe(key(1.0, 1.0), Utc::now(), Duration::milliseconds(5000));
        assert!(state.try_begin_sequence());
        state.reset();
        assert!(state.last_novelty().is_none());
        assert!(state.sequence_in_flight());
    }

    #[test]
    fn test_guard_check_and_set_under_contention() {
        let state = EngineState::new();
        let winners: usize = (0..8)
            .map(|_| {
                let s = state.clone();
                std::thread::spawn(move || s.try_begin_sequence())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }
}
