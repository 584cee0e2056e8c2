use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Offer
// =============================================================================

/// A structured offer extracted from one screen snapshot.
///
/// Built fresh by the parser for every snapshot and never mutated afterwards.
/// Only `rate_per_distance` is mandatory; the other figures default to zero
/// when the text did not contain them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Absolute fare of the job.
    pub total_fare: f64,
    /// Fare per unit of distance. Its presence is what makes an offer.
    pub rate_per_distance: f64,
    /// Distance to reach the customer (first distance figure on screen).
    pub pickup_distance: f64,
    /// Distance of the job itself (second distance figure on screen).
    pub trip_distance: f64,
    /// All source fragments joined with `" | "`, kept for diagnostics.
    pub raw_text: String,
}

impl Offer {
    /// Identity used by the novelty filter.
    pub fn novelty_key(&self) -> NoveltyKey {
        NoveltyKey {
            rate_per_distance: self.rate_per_distance,
            trip_distance: self.trip_distance,
        }
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Offer(total_fare={}, rate_per_distance={}, pickup_distance={}, trip_distance={})",
            self.total_fare, self.rate_per_distance, self.pickup_distance, self.trip_distance
        )
    }
}

/// Exact-match identity of an offer: `(rate_per_distance, trip_distance)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoveltyKey {
    pub rate_per_distance: f64,
    pub trip_distance: f64,
}

/// Outcome of evaluating a novel offer. Never revised once produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub accept: bool,
    /// Fixed-format, human-readable one-liner describing the offer.
    pub summary: String,
}

// =============================================================================
// Screen geometry and timing
// =============================================================================

/// A screen coordinate in device pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// A point is usable only when both coordinates are strictly positive.
    pub fn is_calibrated(&self) -> bool {
        self.x > 0.0 && self.y > 0.0
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.0}, {:.0})", self.x, self.y)
    }
}

/// An inclusive range of milliseconds from which delays are drawn uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    /// Build a range, swapping the bounds if they were given in reverse.
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            min_ms: a.min(b),
            max_ms: a.max(b),
        }
    }

    /// A degenerate range that always yields `ms`.
    pub fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub fn contains(&self, ms: u64) -> bool {
        (self.min_ms..=self.max_ms).contains(&ms)
    }
}

impl fmt::Display for DelayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}ms", self.min_ms, self.max_ms)
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Summary shown before the first offer has been seen.
pub const NO_OFFER_YET: &str = "None yet";

/// Persisted decision counters and the last offer summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub accepted: u64,
    pub rejected: u64,
    pub last_offer: String,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            accepted: 0,
            rejected: 0,
            last_offer: NO_OFFER_YET.to_string(),
        }
    }
}

impl Stats {
    /// Apply one decision: bump the matching counter and remember the summary.
    pub fn record(&mut self, decision: &Decision) {
        if decision.accept {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        self.last_offer = decision.summary.clone();
    }
}
