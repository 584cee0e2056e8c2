//! Sources of randomized delays for tap jitter.
//!
//! Fixed timings are easy to tell apart from human input, so every delay in a
//! sequence is drawn independently. The source is injectable so runs can be
//! reproduced and tests can assert exact timings.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use farewatch_core::types::DelayRange;

/// Draws a delay in milliseconds from an inclusive range.
pub trait DelaySource: Send {
    fn draw_ms(&mut self, range: DelayRange) -> u64;
}

/// Uniform delays from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDelays;

impl DelaySource for RandomDelays {
    fn draw_ms(&mut self, range: DelayRange) -> u64 {
        rand::rng().random_range(range.min_ms..=range.max_ms)
    }
}

/// Uniform delays from a seeded RNG, reproducible across runs.
#[derive(Debug, Clone)]
pub struct SeededDelays {
    rng: StdRng,
}

impl SeededDelays {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DelaySource for SeededDelays {
    fn draw_ms(&mut self, range: DelayRange) -> u64 {
        self.rng.random_range(range.min_ms..=range.max_ms)
    }
}

/// Replays a fixed list of delays, clamped into the requested range.
///
/// Falls back to the range minimum once the list is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDelays {
    values: VecDeque<u64>,
}

impl ScriptedDelays {
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl DelaySource for ScriptedDelays {
    fn draw_ms(&mut self, range: DelayRange) -> u64 {
        self.values
            .pop_front()
            .map_or(range.min_ms, |v| v.clamp(range.min_ms, range.max_ms))
    }
}
