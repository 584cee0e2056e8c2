//! Tap plans: the ordered taps and timing for one accepted offer.

use farewatch_core::config::TapConfig;
use farewatch_core::types::{DelayRange, Point};

use crate::error::TapError;

/// One tap of a sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapStep {
    pub point: Point,
    pub duration_ms: u64,
}

/// Ordered taps plus the timing used to space them out.
#[derive(Debug, Clone, PartialEq)]
pub struct TapPlan {
    pub steps: Vec<TapStep>,
    /// Delay before the first tap.
    pub initial_delay: DelayRange,
    /// Delay between two consecutive taps, drawn independently each time.
    pub inter_step_delay: DelayRange,
    pub show_indicator: bool,
    pub indicator_size_px: u32,
}

impl TapPlan {
    /// Build the accept sequence from the configured targets and timings.
    ///
    /// Fails with [`TapError::Uncalibrated`] listing the 1-based targets that
    /// are unset or have non-positive coordinates.
    pub fn from_config(config: &TapConfig) -> Result<Self, TapError> {
        let missing = config.missing_targets();
        if !missing.is_empty() {
            return Err(TapError::Uncalibrated(missing));
        }

        let steps = config
            .targets()
            .iter()
            .flatten()
            .map(|&point| TapStep {
                point,
                duration_ms: config.tap_duration_ms,
            })
            .collect();

        Ok(Self {
            steps,
            initial_delay: config.initial_delay(),
            inter_step_delay: config.inter_step_delay(),
            show_indicator: config.show_indicator,
            indicator_size_px: config.indicator_size_px,
        })
    }

    /// Check that the plan can be executed as-is.
    pub fn validate(&self) -> Result<(), TapError> {
        if self.steps.is_empty() {
            return Err(TapError::EmptyPlan);
        }
        let uncalibrated: Vec<usize> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.point.is_calibrated())
            .map(|(i, _)| i + 1)
            .collect();
        if uncalibrated.is_empty() {
            Ok(())
        } else {
            Err(TapError::Uncalibrated(uncalibrated))
        }
    }

    /// Shortest and longest total duration of the delays in this plan.
    pub fn delay_bounds_ms(&self) -> (u64, u64) {
        let gaps = self.steps.len().saturating_sub(1) as u64;
        (
            self.initial_delay.min_ms + gaps * self.inter_step_delay.min_ms,
            self.initial_delay.max_ms + gaps * self.inter_step_delay.max_ms,
        )
    }
}
