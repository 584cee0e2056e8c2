//! Accept/reject policy for novel offers.

use farewatch_core::config::PolicyConfig;
use farewatch_core::types::{Decision, Offer};

/// Acceptance thresholds, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_rate_per_distance: f64,
    pub max_pickup_distance: f64,
}

impl From<&PolicyConfig> for Thresholds {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            min_rate_per_distance: config.min_rate_per_distance,
            max_pickup_distance: config.max_pickup_distance,
        }
    }
}

/// Evaluate `offer` against the thresholds.
///
/// Accepts only when the rate is at least the minimum and the pickup
/// distance is at most the maximum. Pure: persisting the outcome is the
/// caller's job.
pub fn evaluate(offer: &Offer, min_rate_per_distance: f64, max_pickup_distance: f64) -> Decision {
    let accept = offer.rate_per_distance >= min_rate_per_distance
        && offer.pickup_distance <= max_pickup_distance;
    Decision {
        accept,
        summary: summarize(offer),
    }
}

/// Same as [`evaluate`] with thresholds taken from a [`Thresholds`] value.
pub fn evaluate_with(offer: &Offer, thresholds: Thresholds) -> Decision {
    evaluate(
        offer,
        thresholds.min_rate_per_distance,
        thresholds.max_pickup_distance,
    )
}

/// `R$15.00 | 3.00/km | Pickup: 2.5km`
pub fn summarize(offer: &Offer) -> String {
    format!(
        "R${:.2} | {:.2}/km | Pickup: {:.1}km",
        offer.total_fare, offer.rate_per_distance, offer.pickup_distance
    )
}
