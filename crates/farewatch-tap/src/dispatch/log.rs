//! Dry-run dispatcher and indicator that only log.

use async_trait::async_trait;

use farewatch_core::types::Point;

use crate::dispatch::{GestureDispatcher, IndicatorDisplay};
use crate::error::TapError;

/// Logs each tap instead of touching a device.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl GestureDispatcher for LogDispatcher {
    async fn dispatch_tap(&self, point: Point, duration_ms: u64) -> Result<(), TapError> {
        tracing::info!(x = point.x, y = point.y, duration_ms, "Dry-run tap");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Logs the indicator position. Used when no overlay is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl IndicatorDisplay for LogIndicator {
    fn show(&self, point: Point, size_px: u32) -> Result<(), TapError> {
        tracing::debug!(x = point.x, y = point.y, size_px, "Tap indicator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_dispatcher_succeeds() {
        let dispatcher = LogDispatcher;
        assert!(dispatcher
            .dispatch_tap(Point::new(10.0, 20.0), 150)
            .await
            .is_ok());
        assert_eq!(dispatcher.name(), "log");
    }

    #[test]
    fn test_log_indicator_succeeds() {
        assert!(LogIndicator.show(Point::new(10.0, 20.0), 100).is_ok());
    }
}
