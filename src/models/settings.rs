use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::retry::RetryPolicy;

const MIN_TIMER_MS: u64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub store_url: String,
    #[serde(default)]
    pub store_api_key: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_ms: u64,
    #[serde(default = "default_deck_fetch_attempts")]
    pub deck_fetch_attempts: u32,
    #[serde(default = "default_deck_fetch_backoff")]
    pub deck_fetch_backoff_ms: u64,
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,
    #[serde(default = "default_store_retry_backoff")]
    pub store_retry_backoff_ms: u64,
    #[serde(default = "default_archive_grace")]
    pub archive_grace_ms: u64,
    #[serde(default = "default_presence_stale")]
    pub presence_stale_secs: i64,
    #[serde(default = "default_match_found_untrack")]
    pub match_found_untrack_ms: u64,
    #[serde(default = "default_think_min")]
    pub computer_think_min_ms: u64,
    #[serde(default = "default_think_max")]
    pub computer_think_max_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_watchdog_interval() -> u64 {
    5000
}
fn default_deck_fetch_attempts() -> u32 {
    5
}
fn default_deck_fetch_backoff() -> u64 {
    1000
}
fn default_store_retry_attempts() -> u32 {
    5
}
fn default_store_retry_backoff() -> u64 {
    1000
}
fn default_archive_grace() -> u64 {
    3000
}
fn default_presence_stale() -> i64 {
    60
}
fn default_match_found_untrack() -> u64 {
    1500
}
fn default_think_min() -> u64 {
    1000
}
fn default_think_max() -> u64 {
    2000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            store_api_key: String::new(),
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval(),
            watchdog_interval_ms: default_watchdog_interval(),
            deck_fetch_attempts: default_deck_fetch_attempts(),
            deck_fetch_backoff_ms: default_deck_fetch_backoff(),
            store_retry_attempts: default_store_retry_attempts(),
            store_retry_backoff_ms: default_store_retry_backoff(),
            archive_grace_ms: default_archive_grace(),
            presence_stale_secs: default_presence_stale(),
            match_found_untrack_ms: default_match_found_untrack(),
            computer_think_min_ms: default_think_min(),
            computer_think_max_ms: default_think_max(),
        }
    }
}

impl Settings {
    /// Reads `Settings.{toml,json,...}` from the working directory when present, then applies
    /// `TRIAD_*` environment overrides (e.g. `TRIAD_POLL_INTERVAL_MS=500`).
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::with_prefix("TRIAD"))
            .build()?
            .try_deserialize()
    }

    /// Session and matchmaking timings. Timer periods are clamped to at least 1ms since
    /// `tokio::time::interval` refuses a zero period.
    pub fn sync(&self) -> SyncSettings {
        SyncSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(MIN_TIMER_MS)),
            watchdog_interval: Duration::from_millis(self.watchdog_interval_ms.max(MIN_TIMER_MS)),
            deck_fetch: RetryPolicy::new(
                self.deck_fetch_attempts,
                Duration::from_millis(self.deck_fetch_backoff_ms),
            ),
            store_retry: RetryPolicy::new(
                self.store_retry_attempts,
                Duration::from_millis(self.store_retry_backoff_ms),
            ),
            archive_grace: Duration::from_millis(self.archive_grace_ms),
            presence_stale: chrono::Duration::seconds(self.presence_stale_secs),
            match_found_untrack: Duration::from_millis(self.match_found_untrack_ms),
        }
    }

    pub fn think_range(&self) -> (Duration, Duration) {
        let min = self.computer_think_min_ms;
        let max = self.computer_think_max_ms.max(min);
        (Duration::from_millis(min), Duration::from_millis(max))
    }
}

/// Timing knobs for the online session and matchmaking, derived from [`Settings`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub watchdog_interval: Duration,
    pub deck_fetch: RetryPolicy,
    /// Budget for store reads and writes of a running session: the startup read and the seed
    /// write are retried with it, later polls and pushes may fail this many times in a row.
    pub store_retry: RetryPolicy,
    pub archive_grace: Duration,
    pub presence_stale: chrono::Duration,
    pub match_found_untrack: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Settings::default().sync()
    }
}
