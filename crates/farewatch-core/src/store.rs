//! Settings and statistics storage.
//!
//! The engine reads thresholds, timings, and tap targets through
//! [`SettingsStore`] and writes back decision counters and the last offer
//! summary. [`MemoryStore`] keeps everything in memory; [`FileStore`]
//! persists the configuration as TOML and the stats as JSON.
//!
//! Recording a decision only touches memory. Writing the stats out is a
//! separate, blocking step ([`SettingsStore::persist_stats`]) that callers
//! run off the decision path.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use tracing::{debug, info};

use crate::config::FarewatchConfig;
use crate::error::{FarewatchError, Result};
use crate::types::{Decision, Stats};

/// Storage for configuration and decision statistics.
pub trait SettingsStore: Send + Sync {
    /// Current configuration snapshot.
    fn config(&self) -> FarewatchConfig;

    /// Apply `edit` to the configuration, validate, and persist it.
    ///
    /// The stored configuration is left unchanged if validation or saving fails.
    fn update_config(&self, edit: &mut dyn FnMut(&mut FarewatchConfig)) -> Result<()>;

    /// Count a decision and remember its summary as the last offer.
    ///
    /// In memory only; never blocks on I/O.
    fn record_decision(&self, decision: &Decision) -> Result<()>;

    /// Write the current stats to durable storage. May block.
    fn persist_stats(&self) -> Result<()> {
        Ok(())
    }

    /// Current statistics snapshot.
    fn stats(&self) -> Stats;

    /// Zero the counters and clear the last offer, persisting the result.
    fn reset_stats(&self) -> Result<()>;
}

fn read_config(lock: &RwLock<FarewatchConfig>) -> FarewatchConfig {
    lock.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn lock_stats(lock: &Mutex<Stats>) -> MutexGuard<'_, Stats> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Validate and persist an edited copy, then swap it in.
///
/// Nothing changes in memory unless `persist` succeeds.
fn apply_edit(
    lock: &RwLock<FarewatchConfig>,
    edit: &mut dyn FnMut(&mut FarewatchConfig),
    persist: impl FnOnce(&FarewatchConfig) -> Result<()>,
) -> Result<()> {
    let mut guard = lock
        .write()
        .map_err(|e| FarewatchError::Storage(format!("Config lock poisoned: {}", e)))?;
    let mut updated = guard.clone();
    edit(&mut updated);
    updated.validate()?;
    persist(&updated)?;
    *guard = updated;
    Ok(())
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: RwLock<FarewatchConfig>,
    stats: Mutex<Stats>,
}

impl MemoryStore {
    pub fn new(config: FarewatchConfig) -> Self {
        Self {
            config: RwLock::new(config),
            stats: Mutex::new(Stats::default()),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn config(&self) -> FarewatchConfig {
        read_config(&self.config)
    }

    fn update_config(&self, edit: &mut dyn FnMut(&mut FarewatchConfig)) -> Result<()> {
        apply_edit(&self.config, edit, |_| Ok(()))
    }

    fn record_decision(&self, decision: &Decision) -> Result<()> {
        lock_stats(&self.stats).record(decision);
        Ok(())
    }

    fn stats(&self) -> Stats {
        lock_stats(&self.stats).clone()
    }

    fn reset_stats(&self) -> Result<()> {
        *lock_stats(&self.stats) = Stats::default();
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// File-backed store: TOML configuration plus a JSON stats file.
#[derive(Debug)]
pub struct FileStore {
    config_path: PathBuf,
    stats_path: PathBuf,
    config: RwLock<FarewatchConfig>,
    stats: Mutex<Stats>,
    // Serializes stats writes so an older snapshot never lands last.
    stats_file: Mutex<()>,
}

impl FileStore {
    /// Open the store.
    ///
    /// A missing configuration file yields defaults; an unreadable or invalid
    /// one is an error so that a typo never silently resets thresholds.
    /// A missing or corrupt stats file starts from zero.
    pub fn open(config_path: &Path, stats_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            FarewatchConfig::load(config_path)?
        } else {
            info!(path = %config_path.display(), "No configuration file, using defaults");
            FarewatchConfig::default()
        };

        let stats = match std::fs::read_to_string(stats_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %stats_path.display(), error = %e, "Stats file unreadable, starting from zero");
                Stats::default()
            }),
            Err(_) => Stats::default(),
        };

        Ok(Self {
            config_path: config_path.to_path_buf(),
            stats_path: stats_path.to_path_buf(),
            config: RwLock::new(config),
            stats: Mutex::new(stats),
            stats_file: Mutex::new(()),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn write_stats(&self) -> Result<()> {
        let _file = self
            .stats_file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = lock_stats(&self.stats).clone();
        if let Some(parent) = self.stats_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.stats_path, content)?;
        debug!(path = %self.stats_path.display(), "Stats saved");
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn config(&self) -> FarewatchConfig {
        read_config(&self.config)
    }

    fn update_config(&self, edit: &mut dyn FnMut(&mut FarewatchConfig)) -> Result<()> {
        apply_edit(&self.config, edit, |updated| updated.save(&self.config_path))
    }

    fn record_decision(&self, decision: &Decision) -> Result<()> {
        lock_stats(&self.stats).record(decision);
        Ok(())
    }

    fn persist_stats(&self) -> Result<()> {
        self.write_stats()
    }

    fn stats(&self) -> Stats {
        lock_stats(&self.stats).clone()
    }

    fn reset_stats(&self) -> Result<()> {
        *lock_stats(&self.stats) = Stats::default();
        self.write_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point, NO_OFFER_YET};

    fn decision(accept: bool, summary: &str) -> Decision {
        Decision {
            accept,
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_memory_store_records_decisions() {
        let store = MemoryStore::default();
        store.record_decision(&decision(true, "first")).unwrap();
        store.record_decision(&decision(false, "second")).unwrap();

        let stats = store.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.last_offer, "second");

        store.reset_stats().unwrap();
        assert_eq!(store.stats(), Stats::default());
    }

    #[test]
    fn test_memory_store_update_config() {
        let store = MemoryStore::default();
        store
            .update_config(&mut |c| c.policy.min_rate_per_distance = 2.75)
            .unwrap();
        assert_eq!(store.config().policy.min_rate_per_distance, 2.75);
    }

    #[test]
    fn test_invalid_update_is_not_applied() {
        let store = MemoryStore::default();
        let result = store.update_config(&mut |c| c.policy.max_pickup_distance = f64::NAN);
        assert!(matches!(result, Err(FarewatchError::Config(_))));
        assert_eq!(store.config().policy.max_pickup_distance, 10.0);
    }

    #[test]
    fn test_file_store_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(
            &dir.path().join("config.toml"),
            &dir.path().join("stats.json"),
        )
        .unwrap();
        assert_eq!(store.config().policy.min_rate_per_distance, 2.0);
        assert_eq!(store.stats().last_offer, NO_OFFER_YET);
    }

    #[test]
    fn test_file_store_persists_stats_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let stats_path = dir.path().join("data").join("stats.json");

        {
            let store = FileStore::open(&config_path, &stats_path).unwrap();
            store
                .update_config(&mut |c| {
                    c.taps.target_2 = Some(Point::new(300.0, 1700.0));
                })
                .unwrap();
            store.record_decision(&decision(true, "R$15.00")).unwrap();
            assert!(!stats_path.exists());
            store.persist_stats().unwrap();
        }

        let reopened = FileStore::open(&config_path, &stats_path).unwrap();
        assert_eq!(
            reopened.config().taps.target_2,
            Some(Point::new(300.0, 1700.0))
        );
        assert_eq!(reopened.stats().accepted, 1);
        assert_eq!(reopened.stats().last_offer, "R$15.00");

        reopened.reset_stats().unwrap();
        let again = FileStore::open(&config_path, &stats_path).unwrap();
        assert_eq!(again.stats(), Stats::default());
    }

    #[test]
    fn test_failed_config_save_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the config directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = FileStore::open(
            &blocker.join("config.toml"),
            &dir.path().join("stats.json"),
        )
        .unwrap();

        let result = store.update_config(&mut |c| c.policy.min_rate_per_distance = 3.5);
        assert!(result.is_err());
        assert_eq!(store.config().policy.min_rate_per_distance, 2.0);
    }

    #[test]
    fn test_persist_writes_latest_stats() {
        let dir = tempfile::tempdir().unwrap();
        let stats_path = dir.path().join("stats.json");
        let store = FileStore::open(&dir.path().join("config.toml"), &stats_path).unwrap();
        store.record_decision(&decision(true, "first")).unwrap();
        store.record_decision(&decision(false, "second")).unwrap();
        store.persist_stats().unwrap();

        let saved: Stats =
            serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();
        assert_eq!(saved, store.stats());
        assert_eq!(saved.last_offer, "second");
    }

    #[test]
    fn test_file_store_rejects_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "[policy]\nmin_rate_per_distance = \"lots\"\n").unwrap();
        let result = FileStore::open(&config_path, &dir.path().join("stats.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_store_corrupt_stats_start_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let stats_path = dir.path().join("stats.json");
        std::fs::write(&stats_path, "not json").unwrap();
        let store = FileStore::open(&dir.path().join("config.toml"), &stats_path).unwrap();
        assert_eq!(store.stats(), Stats::default());
    }
}
