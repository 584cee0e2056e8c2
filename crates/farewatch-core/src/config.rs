use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FarewatchError, Result};
use crate::types::{DelayRange, Point};

/// Number of calibrated tap targets in the accept sequence.
pub const TARGET_COUNT: usize = 3;

/// Top-level configuration for Farewatch.
///
/// Loaded from `~/.farewatch/config.toml` by default. Every section and field
/// falls back to its default when missing from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarewatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub taps: TapConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl FarewatchConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FarewatchConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FarewatchError::Config(e.to_string()))
    }

    /// Reject values that would make the policy or the tap timing meaningless.
    pub fn validate(&self) -> Result<()> {
        let policy = &self.policy;
        if !policy.min_rate_per_distance.is_finite() || policy.min_rate_per_distance < 0.0 {
            return Err(FarewatchError::Config(format!(
                "policy.min_rate_per_distance must be a non-negative number, got {}",
                policy.min_rate_per_distance
            )));
        }
        if !policy.max_pickup_distance.is_finite() || policy.max_pickup_distance < 0.0 {
            return Err(FarewatchError::Config(format!(
                "policy.max_pickup_distance must be a non-negative number, got {}",
                policy.max_pickup_distance
            )));
        }
        if self.taps.tap_duration_ms == 0 {
            return Err(FarewatchError::Config(
                "taps.tap_duration_ms must be greater than zero".to_string(),
            ));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(FarewatchError::Config(
                "capture.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for persisted stats.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.farewatch".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Acceptance thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Minimum fare per distance unit to accept (inclusive).
    pub min_rate_per_distance: f64,
    /// Maximum distance to the customer to accept (inclusive).
    pub max_pickup_distance: f64,
    /// Tap the accept sequence automatically for accepted offers.
    pub auto_accept: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_rate_per_distance: 2.0,
            max_pickup_distance: 10.0,
            auto_accept: true,
        }
    }
}

/// Tap targets and timing for the accept sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Flash an indicator at each target right before it is tapped.
    pub show_indicator: bool,
    /// Side length of the indicator square.
    pub indicator_size_px: u32,
    /// How long each tap is held.
    pub tap_duration_ms: u64,
    pub inter_step_delay_min_ms: u64,
    pub inter_step_delay_max_ms: u64,
    pub initial_delay_min_ms: u64,
    pub initial_delay_max_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_1: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_2: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_3: Option<Point>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            show_indicator: true,
            indicator_size_px: 100,
            tap_duration_ms: 150,
            inter_step_delay_min_ms: 100,
            inter_step_delay_max_ms: 200,
            initial_delay_min_ms: 100,
            initial_delay_max_ms: 300,
            target_1: None,
            target_2: None,
            target_3: None,
        }
    }
}

impl TapConfig {
    /// The three targets in tap order.
    pub fn targets(&self) -> [Option<Point>; TARGET_COUNT] {
        [self.target_1, self.target_2, self.target_3]
    }

    /// Set target `index` (1-based, as shown to the operator).
    pub fn set_target(&mut self, index: usize, point: Point) -> Result<()> {
        let slot = match index {
            1 => &mut self.target_1,
            2 => &mut self.target_2,
            3 => &mut self.target_3,
            _ => {
                return Err(FarewatchError::Config(format!(
                    "target index must be between 1 and {}, got {}",
                    TARGET_COUNT, index
                )))
            }
        };
        *slot = Some(point);
        Ok(())
    }

    /// 1-based indices of targets that are unset or have non-positive coordinates.
    pub fn missing_targets(&self) -> Vec<usize> {
        self.targets()
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_some_and(|p| p.is_calibrated()))
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// Whether all three targets have been calibrated.
    pub fn is_calibrated(&self) -> bool {
        self.missing_targets().is_empty()
    }

    pub fn initial_delay(&self) -> DelayRange {
        DelayRange::new(self.initial_delay_min_ms, self.initial_delay_max_ms)
    }

    pub fn inter_step_delay(&self) -> DelayRange {
        DelayRange::new(self.inter_step_delay_min_ms, self.inter_step_delay_max_ms)
    }
}

/// Snapshot source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Path to the `adb` executable.
    pub adb_path: String,
    /// Device serial passed as `adb -s`; the only attached device when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_serial: Option<String>,
    /// Package whose screen is watched; snapshots of other apps are ignored.
    pub target_package: String,
    /// Delay between two UI dumps.
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_serial: None,
            target_package: "com.taxis99".to_string(),
            poll_interval_ms: 500,
        }
    }
}

impl CaptureConfig {
    /// Full `adb` argument list for `args`, targeting the configured device.
    pub fn adb_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = self.device_serial.as_deref() {
            full.push("-s");
            full.push(serial);
        }
        full.extend_from_slice(args);
        full
    }
}
