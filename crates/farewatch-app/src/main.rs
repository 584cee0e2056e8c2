//! Farewatch application binary - composition root.
//!
//! Ties together all Farewatch crates into a single executable:
//! 1. Load configuration from TOML and stats from JSON
//! 2. Build the engine with an adb-backed screen source and tap dispatcher
//! 3. Poll the device until Ctrl-C, logging engine events as a status line
//!
//! The remaining subcommands inspect and edit the stored settings.

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};

use farewatch_capture::UiDumpSource;
use farewatch_core::config::FarewatchConfig;
use farewatch_core::error::FarewatchError;
use farewatch_core::events::EngineEvent;
use farewatch_core::store::{FileStore, SettingsStore};
use farewatch_core::types::Point;
use farewatch_engine::{EngineCoordinator, Monitor};
use farewatch_tap::{AdbDispatcher, GestureDispatcher, LogDispatcher, LogIndicator};

use cli::{CliArgs, Command};

/// Open the settings store, placing stats under the configured data directory.
fn open_store(config_path: &Path) -> Result<FileStore, FarewatchError> {
    let data_dir = if config_path.exists() {
        FarewatchConfig::load(config_path)?.general.data_dir
    } else {
        FarewatchConfig::default().general.data_dir
    };
    let stats_path = cli::expand_home(&data_dir).join("stats.json");
    FileStore::open(config_path, &stats_path)
}

/// Refuse to run with auto-accept on while any target is missing.
fn ensure_runnable(config: &FarewatchConfig) -> Result<(), FarewatchError> {
    if !config.policy.auto_accept {
        return Ok(());
    }
    let missing = config.taps.missing_targets();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FarewatchError::Calibration(format!(
            "targets {:?} not set, run `farewatch calibrate` or disable policy.auto_accept",
            missing
        )))
    }
}

/// Store one target and return the targets still missing.
fn calibrate(
    store: &dyn SettingsStore,
    target: usize,
    point: Point,
) -> Result<Vec<usize>, FarewatchError> {
    let mut result = Ok(());
    store.update_config(&mut |config| result = config.taps.set_target(target, point))?;
    result?;
    Ok(store.config().taps.missing_targets())
}

/// Log engine events until the engine goes away.
async fn log_events(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::OfferDecided {
                accepted, summary, ..
            }) => {
                tracing::info!(accepted, summary = %summary, "Status");
            }
            Ok(EngineEvent::CalibrationRequired {
                missing_targets, ..
            }) => {
                tracing::warn!(missing_targets = ?missing_targets, "Calibration required");
            }
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => tracing::debug!(event = event.name(), json = %json, "Engine event"),
                Err(e) => tracing::debug!(event = event.name(), error = %e, "Engine event"),
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run(store: Arc<FileStore>, dry_run: bool) -> Result<(), FarewatchError> {
    let config = store.config();
    ensure_runnable(&config)?;

    let dispatcher: Arc<dyn GestureDispatcher> = if dry_run {
        tracing::info!("Dry run: taps are logged, not sent");
        Arc::new(LogDispatcher)
    } else {
        Arc::new(AdbDispatcher::new(config.capture.clone()))
    };

    let engine = EngineCoordinator::new(store.clone(), dispatcher).with_indicator(Arc::new(LogIndicator));
    tokio::spawn(log_events(engine.subscribe()));

    let source = UiDumpSource::new(config.capture.clone());
    let monitor = Monitor::new(Duration::from_millis(config.capture.poll_interval_ms));

    let shutdown = monitor.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, stopping");
                shutdown.notify_one();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    tracing::info!(
        package = %config.capture.target_package,
        min_rate = config.policy.min_rate_per_distance,
        max_pickup = config.policy.max_pickup_distance,
        auto_accept = config.policy.auto_accept,
        "Watching for offers"
    );

    let summary = monitor.run(&engine, &source).await;
    if let Some(report) = engine.wait_for_sequence().await {
        tracing::debug!(report = ?report, "Last tap sequence");
    }

    if let Err(e) = store.persist_stats() {
        tracing::warn!(error = %e, "Failed to save stats");
    }
    let stats = engine.stats();
    tracing::info!(
        polls = summary.polls,
        offers_forwarded = summary.forwarded,
        accepted = stats.accepted,
        rejected = stats.rejected,
        "Farewatch stopped"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();

    // Tracing. Logs go to stderr so command output stays clean.
    let level =
        args.resolve_log_level(&FarewatchConfig::load_or_default(&config_file).general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::debug!("Starting Farewatch v{}", env!("CARGO_PKG_VERSION"));

    let store = match open_store(&config_file) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Failed to open settings");
            return Err(e.into());
        }
    };

    match args.command {
        Command::Run { dry_run } => run(store, dry_run).await?,
        Command::Parse { fragments } => {
            let engine = EngineCoordinator::new(store, Arc::new(LogDispatcher));
            match engine.preview(&fragments) {
                Some((offer, decision)) => {
                    println!("{}", offer);
                    let verdict = if decision.accept { "ACCEPT" } else { "REJECT" };
                    println!("{} {}", verdict, decision.summary);
                }
                None => println!("No offer found"),
            }
        }
        Command::Calibrate { target, x, y } => {
            let point = Point::new(x, y);
            if !point.is_calibrated() {
                tracing::warn!(%point, "Coordinates must be positive to count as calibrated");
            }
            let missing = calibrate(store.as_ref(), usize::from(target), point)?;
            println!("Target {} set to {}", target, point);
            if missing.is_empty() {
                println!("All targets calibrated");
            } else {
                println!("Still missing: {:?}", missing);
            }
        }
        Command::Config => {
            println!("# {}", store.config_path().display());
            print!("{}", store.config().to_toml()?);
        }
        Command::Stats { reset, json } => {
            if reset {
                store.reset_stats()?;
            }
            let stats = store.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Accepted:   {}", stats.accepted);
                println!("Rejected:   {}", stats.rejected);
                println!("Last offer: {}", stats.last_offer);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use farewatch_core::store::MemoryStore;
    use farewatch_core::types::Decision;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_runnable() {
        let mut config = FarewatchConfig::default();
        assert!(matches!(
            ensure_runnable(&config),
            Err(FarewatchError::Calibration(_))
        ));

        config.policy.auto_accept = false;
        assert!(ensure_runnable(&config).is_ok());

        config.policy.auto_accept = true;
        for target in 1..=3 {
            config
                .taps
                .set_target(target, Point::new(100.0, 200.0))
                .unwrap();
        }
        assert!(ensure_runnable(&config).is_ok());
    }

    #[test]
    fn test_calibrate_reports_missing_targets() {
        let store = MemoryStore::default();
        assert_eq!(
            calibrate(&store, 2, Point::new(540.0, 1840.0)).unwrap(),
            vec![1, 3]
        );
        assert_eq!(
            store.config().taps.target_2,
            Some(Point::new(540.0, 1840.0))
        );
        assert!(calibrate(&store, 4, Point::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_open_store_uses_data_dir() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!("[general]\ndata_dir = {:?}\n", data_dir.display().to_string()),
        )
        .unwrap();

        let store = open_store(&config_path).unwrap();
        store
            .record_decision(&Decision {
                accept: true,
                summary: "R$15.00 | 3.00/km | Pickup: 2.5km".to_string(),
            })
            .unwrap();
        store.persist_stats().unwrap();
        assert!(data_dir.join("stats.json").exists());

        let reopened = open_store(&config_path).unwrap();
        assert_eq!(reopened.stats().accepted, 1);
    }

    #[test]
    fn test_open_store_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "[policy]\nmin_rate_per_distance = -3.0\n").unwrap();
        assert!(open_store(&config_path).is_err());
    }
}
