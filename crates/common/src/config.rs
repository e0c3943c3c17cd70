use std::time::Duration;

use chrono::NaiveTime;

use crate::MAX_SCAN_SYMBOLS;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,

    // Volume monitoring
    pub poll_interval: Duration,
    pub collapse_ratio: f64,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,

    // Pattern scan
    pub scan_lookback_days: u64,
    pub scan_symbol_limit: usize,

    // Optional TOML file with classifier thresholds
    pub pattern_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let collapse_ratio: f64 = optional_env("COLLAPSE_RATIO")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.3);
        if !(0.0..=1.0).contains(&collapse_ratio) {
            panic!("COLLAPSE_RATIO must be between 0 and 1, got: {collapse_ratio}");
        }

        Config {
            telegram_token: required_env("TELEGRAM_TOKEN"),
            poll_interval: Duration::from_secs(
                optional_env("POLL_INTERVAL_SECS")
                    .and_then(|v| v.parse().ok())
                    .filter(|&secs: &u64| secs > 0)
                    .unwrap_or(60),
            ),
            collapse_ratio,
            window_start: time_env("MONITOR_WINDOW_START", "23:30"),
            window_end: time_env("MONITOR_WINDOW_END", "05:00"),
            scan_lookback_days: optional_env("SCAN_LOOKBACK_DAYS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            scan_symbol_limit: optional_env("SCAN_SYMBOL_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_SCAN_SYMBOLS)
                .min(MAX_SCAN_SYMBOLS),
            pattern_config_path: optional_env("PATTERN_CONFIG_PATH"),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn time_env(key: &str, default: &str) -> NaiveTime {
    let raw = optional_env(key).unwrap_or_else(|| default.to_string());
    parse_hhmm(&raw).unwrap_or_else(|| panic!("{key} must be formatted as HH:MM, got: '{raw}'"))
}

/// Parse a wall-clock time written as `HH:MM`.
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}
