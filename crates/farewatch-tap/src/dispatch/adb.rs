//! Tap dispatch over `adb shell input`.
//!
//! A tap with a hold duration is sent as a zero-length swipe:
//! `adb shell input swipe X Y X Y DURATION`.

use std::time::Duration;

use async_trait::async_trait;

use farewatch_core::config::CaptureConfig;
use farewatch_core::types::Point;

use crate::dispatch::GestureDispatcher;
use crate::error::TapError;

/// Upper bound on one `adb` invocation, on top of the tap's own duration.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatches taps to an Android device through `adb`.
pub struct AdbDispatcher {
    capture: CaptureConfig,
}

impl AdbDispatcher {
    /// Use the adb path and device serial from `capture`.
    pub fn new(capture: CaptureConfig) -> Self {
        Self { capture }
    }

    /// Arguments passed after `adb [-s SERIAL]`.
    fn swipe_args(point: Point, duration_ms: u64) -> Vec<String> {
        let x = point.x.round() as i64;
        let y = point.y.round() as i64;
        vec![
            "shell".to_string(),
            "input".to_string(),
            "swipe".to_string(),
            x.to_string(),
            y.to_string(),
            x.to_string(),
            y.to_string(),
            duration_ms.to_string(),
        ]
    }
}

#[async_trait]
impl GestureDispatcher for AdbDispatcher {
    async fn dispatch_tap(&self, point: Point, duration_ms: u64) -> Result<(), TapError> {
        let swipe = Self::swipe_args(point, duration_ms);
        let swipe_refs: Vec<&str> = swipe.iter().map(String::as_str).collect();
        let args = self.capture.adb_args(&swipe_refs);

        tracing::debug!(adb = %self.capture.adb_path, ?args, "Dispatching tap");

        let child = tokio::process::Command::new(&self.capture.adb_path)
            .args(&args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TapError::DispatchFailed(format!("failed to run {}: {}", self.capture.adb_path, e))
            })?;

        let limit = COMMAND_TIMEOUT + Duration::from_millis(duration_ms);
        let output = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| TapError::DispatchFailed(format!("adb timed out after {:?}", limit)))?
            .map_err(|e| TapError::DispatchFailed(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(TapError::DispatchFailed(format!(
                "adb exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }

    fn name(&self) -> &'static str {
        "adb"
    }
}
