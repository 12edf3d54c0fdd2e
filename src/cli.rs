//! Command-line interface parsing for the cat fact viewer
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into the runtime configuration (staleness threshold, refresh interval,
//! retry bound) used to construct the store and controller.

use clap::Parser;
use std::time::Duration;
use thiserror::Error;

use crate::refetch::{RefreshConfig, RetryConfig};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// A refresh needs at least one fetch attempt
    #[error("Invalid retry count: {0}. --retries must be at least 1")]
    InvalidRetries(u32),
}

/// Cat facts in your terminal
#[derive(Parser, Debug)]
#[command(name = "catfacts")]
#[command(about = "Random cat facts with caching, staleness tracking, and retry")]
#[command(version)]
pub struct Cli {
    /// Fetch a single fact, print it to stdout, and exit
    ///
    /// Examples:
    ///   catfacts --once              # one fact, no TUI
    ///   catfacts --once --retries 5  # try harder on a flaky connection
    #[arg(long)]
    pub once: bool,

    /// Seconds before a fetched fact counts as stale
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub stale_time: u64,

    /// Seconds between automatic refresh checks (0 disables auto refresh)
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub refresh_interval: u64,

    /// Total fetch attempts per refresh before giving up
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub retries: u32,
}

/// Runtime configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Whether to run the one-shot non-TUI path
    pub once: bool,
    /// Staleness threshold for cached facts
    pub stale_time: Duration,
    /// Background refresh settings
    pub refresh: RefreshConfig,
    /// Retry policy for failed fetches
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Builds the runtime configuration from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(AppConfig)` with validated settings
    /// * `Err(CliError)` if `--retries` is zero
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.retries == 0 {
            return Err(CliError::InvalidRetries(cli.retries));
        }

        let stale_time = Duration::from_secs(cli.stale_time);
        Ok(Self {
            once: cli.once,
            stale_time,
            refresh: RefreshConfig {
                interval: Duration::from_secs(cli.refresh_interval),
                stale_time,
                enabled: cli.refresh_interval > 0,
            },
            retry: RetryConfig {
                max_attempts: cli.retries,
                ..RetryConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args_uses_defaults() {
        let cli = Cli::parse_from(["catfacts"]);
        assert!(!cli.once);
        assert_eq!(cli.stale_time, 30);
        assert_eq!(cli.refresh_interval, 60);
        assert_eq!(cli.retries, 3);
    }

    #[test]
    fn test_cli_parse_once_flag() {
        let cli = Cli::parse_from(["catfacts", "--once"]);
        assert!(cli.once);
    }

    #[test]
    fn test_cli_parse_custom_values() {
        let cli = Cli::parse_from([
            "catfacts",
            "--stale-time",
            "5",
            "--refresh-interval",
            "10",
            "--retries",
            "7",
        ]);
        assert_eq!(cli.stale_time, 5);
        assert_eq!(cli.refresh_interval, 10);
        assert_eq!(cli.retries, 7);
    }

    #[test]
    fn test_app_config_from_cli_defaults() {
        let cli = Cli::parse_from(["catfacts"]);
        let config = AppConfig::from_cli(&cli).unwrap();

        assert!(!config.once);
        assert_eq!(config.stale_time, Duration::from_secs(30));
        assert_eq!(config.refresh.interval, Duration::from_secs(60));
        assert_eq!(config.refresh.stale_time, Duration::from_secs(30));
        assert!(config.refresh.enabled);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_app_config_zero_refresh_interval_disables_auto_refresh() {
        let cli = Cli::parse_from(["catfacts", "--refresh-interval", "0"]);
        let config = AppConfig::from_cli(&cli).unwrap();

        assert!(!config.refresh.enabled);
    }

    #[test]
    fn test_app_config_zero_retries_is_rejected() {
        let cli = Cli::parse_from(["catfacts", "--retries", "0"]);
        let result = AppConfig::from_cli(&cli);

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_app_config_stale_time_feeds_refresh_config() {
        let cli = Cli::parse_from(["catfacts", "--stale-time", "120"]);
        let config = AppConfig::from_cli(&cli).unwrap();

        assert_eq!(config.stale_time, Duration::from_secs(120));
        assert_eq!(config.refresh.stale_time, Duration::from_secs(120));
    }
}
