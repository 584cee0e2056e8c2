//! CLI argument definitions for the Farewatch application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Farewatch - watches a ride-hailing app for job offers and accepts the good ones.
#[derive(Parser, Debug)]
#[command(name = "farewatch", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Watch the device screen and act on offers until Ctrl-C.
    Run {
        /// Log taps instead of sending them to the device.
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse text fragments as one screen and show the decision.
    Parse {
        /// Screen text fragments in display order.
        #[arg(required = true)]
        fragments: Vec<String>,
    },
    /// Set the screen position of one accept tap target.
    Calibrate {
        /// Target number, 1 to 3, in tap order.
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        target: u8,
        #[arg(long)]
        x: f32,
        #[arg(long)]
        y: f32,
    },
    /// Print the effective configuration.
    Config,
    /// Show decision statistics.
    Stats {
        /// Zero the counters and clear the last offer.
        #[arg(long)]
        reset: bool,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > FAREWATCH_CONFIG env var > ~/.farewatch/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("FAREWATCH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    home_dir()
        .map(|home| home.join(".farewatch").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}
