//! Polling loop feeding snapshots into the coordinator.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use farewatch_capture::{ChangeDetector, SnapshotSource};

use crate::coordinator::EngineCoordinator;

/// Counters for one monitoring run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub session_id: Uuid,
    pub polls: u64,
    /// Snapshots whose content changed and were handed to the coordinator.
    pub forwarded: u64,
    /// Polls where the target app was not in the foreground.
    pub background: u64,
    pub errors: u64,
}

/// Polls a snapshot source at a fixed interval for the length of one session.
pub struct Monitor {
    poll_interval: Duration,
    shutdown: Arc<Notify>,
}

impl Monitor {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle that can stop the loop from another task.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the loop to stop. A signal sent before `run` is kept.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Start a session and poll `source` until shutdown, then stop the session.
    ///
    /// Unchanged snapshots are not forwarded. Source errors skip the poll.
    /// Shutdown also interrupts a snapshot that is still in progress.
    pub async fn run<S: SnapshotSource>(
        &self,
        engine: &EngineCoordinator,
        source: &S,
    ) -> MonitorSummary {
        let mut summary = MonitorSummary {
            session_id: engine.start_session(),
            ..MonitorSummary::default()
        };
        let mut detector = ChangeDetector::new();
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Monitor loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.notified() => break,
            }
            summary.polls += 1;

            let result = tokio::select! {
                result = source.snapshot() => result,
                _ = self.shutdown.notified() => break,
            };
            match result {
                Ok(Some(snapshot)) => {
                    if !detector.is_changed(&snapshot.fragments) {
                        continue;
                    }
                    summary.forwarded += 1;
                    let outcome = engine.on_snapshot(&snapshot.fragments, Utc::now());
                    tracing::debug!(outcome = ?outcome, "Snapshot processed");
                }
                Ok(None) => {
                    summary.background += 1;
                    detector.reset();
                }
                Err(e) => {
                    summary.errors += 1;
                    tracing::warn!(error = %e, "Snapshot failed, skipping poll");
                }
            }
        }

        engine.stop_session();
        tracing::info!(
            polls = summary.polls,
            forwarded = summary.forwarded,
            errors = summary.errors,
            "Monitor loop stopped"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farewatch_capture::{CaptureError, MockSnapshotSource, Snapshot};
    use farewatch_core::config::FarewatchConfig;
    use farewatch_core::store::{MemoryStore, SettingsStore};
    use farewatch_tap::RecordingDispatcher;

    const OFFER: [&str; 4] = ["R$ 15,00", "R$ 3,00/km", "2,5 km", "5,0 km"];

    fn engine() -> (EngineCoordinator, Arc<MemoryStore>) {
        let mut config = FarewatchConfig::default();
        config.policy.min_rate_per_distance = 2.5;
        config.policy.auto_accept = false;
        let store = Arc::new(MemoryStore::new(config));
        let engine = EngineCoordinator::new(store.clone(), Arc::new(RecordingDispatcher::new()));
        (engine, store)
    }

    #[tokio::test]
    async fn test_monitor_shutdown_before_run() {
        let (engine, _) = engine();
        let monitor = Monitor::new(Duration::from_millis(500));
        monitor.shutdown();

        let summary = tokio::time::timeout(
            Duration::from_secs(2),
            monitor.run(&engine, &MockSnapshotSource::new()),
        )
        .await
        .expect("Monitor should shut down within timeout");
        assert_eq!(summary.polls, 0);
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_forwards_changed_snapshots() {
        let (engine, store) = engine();
        let source = MockSnapshotSource::new();
        source.push_screen(&OFFER);
        source.push_screen(&OFFER);
        source.push_background();
        source.push_screen(&OFFER);
        source.push_screen(&["Você está online"]);

        let monitor = Monitor::new(Duration::from_millis(500));
        let (summary, _) = tokio::join!(monitor.run(&engine, &source), async {
            tokio::time::sleep(Duration::from_millis(2250)).await;
            monitor.shutdown();
        });

        assert_eq!(summary.polls, 5);
        assert_eq!(summary.forwarded, 3);
        assert_eq!(summary.background, 1);
        assert_eq!(summary.errors, 0);
        // The offer reappearing within the debounce window is not counted again.
        assert_eq!(store.stats().accepted, 1);
        assert!(!engine.is_active());
    }

    struct FailingSource;

    impl SnapshotSource for FailingSource {
        async fn snapshot(&self) -> Result<Option<Snapshot>, CaptureError> {
            Err(CaptureError::CommandFailed("device offline".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_survives_source_errors() {
        let (engine, _) = engine();
        let monitor = Monitor::new(Duration::from_millis(100));
        let handle = monitor.shutdown_handle();

        let (summary, _) = tokio::join!(monitor.run(&engine, &FailingSource), async {
            tokio::time::sleep(Duration::from_millis(350)).await;
            handle.notify_one();
        });

        assert_eq!(summary.polls, 4);
        assert_eq!(summary.errors, 4);
        assert_eq!(summary.forwarded, 0);
    }

    struct HungSource;

    impl SnapshotSource for HungSource {
        async fn snapshot(&self) -> Result<Option<Snapshot>, CaptureError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_hung_snapshot() {
        let (engine, _) = engine();
        let monitor = Monitor::new(Duration::from_millis(100));
        let handle = monitor.shutdown_handle();

        let (summary, _) = tokio::join!(monitor.run(&engine, &HungSource), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.notify_one();
        });

        assert_eq!(summary.polls, 1);
        assert_eq!(summary.errors, 0);
        assert!(!engine.is_active());
    }
}
