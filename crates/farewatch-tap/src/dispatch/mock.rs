//! In-memory dispatcher and indicator that record what they were asked to do.
//!
//! Timestamps use `tokio::time::Instant` so tests running on a paused clock
//! can assert the spacing between taps.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use farewatch_core::types::Point;

use crate::dispatch::{GestureDispatcher, IndicatorDisplay};
use crate::error::TapError;

/// A tap captured by [`RecordingDispatcher`].
#[derive(Debug, Clone, Copy)]
pub struct RecordedTap {
    pub point: Point,
    pub duration_ms: u64,
    pub at: Instant,
}

/// Records every tap. Optionally fails on the n-th call (1-based) or takes
/// a fixed time to return, like a real device round trip.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    taps: Mutex<Vec<RecordedTap>>,
    calls: Mutex<usize>,
    fail_on_call: Option<usize>,
    latency: Option<Duration>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher whose `call`-th dispatch returns an error.
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    /// A dispatcher that records the tap, then waits `latency` before returning.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Successful taps in dispatch order.
    pub fn taps(&self) -> Vec<RecordedTap> {
        self.taps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn tap_count(&self) -> usize {
        self.taps.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl GestureDispatcher for RecordingDispatcher {
    async fn dispatch_tap(&self, point: Point, duration_ms: u64) -> Result<(), TapError> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            *calls += 1;
            *calls
        };
        if self.fail_on_call == Some(call) {
            return Err(TapError::DispatchFailed(format!(
                "simulated failure on call {}",
                call
            )));
        }
        self.taps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedTap {
                point,
                duration_ms,
                at: Instant::now(),
            });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Records indicator positions. Can be set to fail every call.
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    shown: Mutex<Vec<(Point, u32)>>,
    fail: bool,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<(Point, u32)> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl IndicatorDisplay for RecordingIndicator {
    fn show(&self, point: Point, size_px: u32) -> Result<(), TapError> {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((point, size_px));
        if self.fail {
            return Err(TapError::Indicator("overlay unavailable".to_string()));
        }
        Ok(())
    }
}
