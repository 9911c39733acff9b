//! Station configuration.
//!
//! Layers, lowest first:
//! 1. built-in defaults ([`StationConfig::default`])
//! 2. a JSON file named by `CALLBOT_CONFIG` (any subset of fields)
//! 3. environment variables
//!
//! | Variable                       | Field                  | Default  |
//! |--------------------------------|------------------------|----------|
//! | `WS_ADDRESS`                   | `ws_address`           | required |
//! | `SITE_ADDRESS`                 | `site_address`         | required |
//! | `USERNAME`                     | `username`             | from MAC |
//! | `GPS_RATE`                     | `gps_rate_hz`          | push     |
//! | `GPS_REPLAY_FILE`              | `gps_replay_file`      | none     |
//! | `CALLBOT_RECONNECT_INITIAL_MS` | `reconnect_initial_ms` | 500      |
//! | `CALLBOT_RECONNECT_MAX_MS`     | `reconnect_max_ms`     | 30000    |
//! | `CALLBOT_CONNECT_TIMEOUT_MS`   | `connect_timeout_ms`   | 5000     |
//! | `CALLBOT_AUTO_RESET_SECS`      | `auto_reset_secs`      | off      |
//! | `CALLBOT_NOTICE_MS`            | `notice_ms`            | 2000     |
//! | `CALLBOT_BLINK_MS`             | `blink_ms`             | 500      |
//! | `CALLBOT_POLL_MS`              | `poll_ms`              | 100      |

use std::fs;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::coordinator::CoordinatorSettings;
use crate::app::relay::RelayMode;
use crate::error::ConfigError;
use crate::remote::RemoteSettings;

/// Names the optional JSON config file.
pub const CONFIG_FILE_VAR: &str = "CALLBOT_CONFIG";

/// Upper bound on any configured period: one day.
pub const MAX_PERIOD_MS: u64 = 86_400_000;

/// Accepted `GPS_RATE` range.
const GPS_RATE_HZ: core::ops::RangeInclusive<f64> = 0.001..=1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    // --- Server ---
    /// Websocket endpoint, `ws://host[:port]/path`.
    pub ws_address: String,
    /// Registration endpoint (HTTP form POST).
    pub site_address: String,
    /// Identity override; derived from the MAC when absent.
    pub username: Option<String>,

    // --- Location ---
    /// Fixed relay rate in Hz; push mode when absent.
    pub gps_rate_hz: Option<f64>,
    /// JSON-lines fix recording to replay.
    pub gps_replay_file: Option<String>,

    // --- Timing ---
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// TCP connect and HTTP request timeout.
    pub connect_timeout_ms: u64,
    /// Leave `Complete` / `Cancelled` automatically after this long.
    pub auto_reset_secs: Option<u64>,
    /// How long a rejection notice stays up.
    pub notice_ms: u64,
    /// Blink half period.
    pub blink_ms: u64,
    /// Worker poll interval (read timeout, stop latency).
    pub poll_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            ws_address: String::new(),
            site_address: String::new(),
            username: None,

            gps_rate_hz: None,
            gps_replay_file: None,

            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            connect_timeout_ms: 5_000,
            auto_reset_secs: None,
            notice_ms: 2_000,
            blink_ms: 500,
            poll_ms: 100,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_owned(),
    })
}

impl StationConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup, then validate.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(CONFIG_FILE_VAR) {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the JSON file layer. Missing fields keep their defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::File {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("WS_ADDRESS") {
            self.ws_address = v.trim().to_owned();
        }
        if let Some(v) = lookup("SITE_ADDRESS") {
            self.site_address = v.trim().to_owned();
        }
        if let Some(v) = lookup("USERNAME") {
            self.username = Some(v);
        }
        if let Some(v) = lookup("GPS_RATE") {
            self.gps_rate_hz = Some(parse("GPS_RATE", &v)?);
        }
        if let Some(v) = lookup("GPS_REPLAY_FILE") {
            self.gps_replay_file = Some(v);
        }
        if let Some(v) = lookup("CALLBOT_RECONNECT_INITIAL_MS") {
            self.reconnect_initial_ms = parse("CALLBOT_RECONNECT_INITIAL_MS", &v)?;
        }
        if let Some(v) = lookup("CALLBOT_RECONNECT_MAX_MS") {
            self.reconnect_max_ms = parse("CALLBOT_RECONNECT_MAX_MS", &v)?;
        }
        if let Some(v) = lookup("CALLBOT_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = parse("CALLBOT_CONNECT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("CALLBOT_AUTO_RESET_SECS") {
            self.auto_reset_secs = Some(parse("CALLBOT_AUTO_RESET_SECS", &v)?);
        }
        if let Some(v) = lookup("CALLBOT_NOTICE_MS") {
            self.notice_ms = parse("CALLBOT_NOTICE_MS", &v)?;
        }
        if let Some(v) = lookup("CALLBOT_BLINK_MS") {
            self.blink_ms = parse("CALLBOT_BLINK_MS", &v)?;
        }
        if let Some(v) = lookup("CALLBOT_POLL_MS") {
            self.poll_ms = parse("CALLBOT_POLL_MS", &v)?;
        }
        Ok(())
    }

    /// Check required values and ranges.
    ///
    /// Every period is capped at [`MAX_PERIOD_MS`] so derived deadlines stay
    /// representable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ws_address.is_empty() {
            return Err(ConfigError::Missing("WS_ADDRESS"));
        }
        if self.site_address.is_empty() {
            return Err(ConfigError::Missing("SITE_ADDRESS"));
        }
        if !self.ws_address.starts_with("ws://") {
            return Err(ConfigError::ValidationFailed("WS_ADDRESS must be a ws:// URL"));
        }
        if !(self.site_address.starts_with("http://") || self.site_address.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed(
                "SITE_ADDRESS must be an http:// or https:// URL",
            ));
        }
        if let Some(hz) = self.gps_rate_hz {
            if !hz.is_finite() || hz <= 0.0 {
                return Err(ConfigError::ValidationFailed("GPS_RATE must be a positive number"));
            }
            if !GPS_RATE_HZ.contains(&hz) {
                return Err(ConfigError::ValidationFailed(
                    "GPS_RATE must be between 0.001 and 1000 Hz",
                ));
            }
        }
        if self.reconnect_initial_ms == 0 || self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(ConfigError::ValidationFailed(
                "reconnect backoff needs 0 < initial <= max",
            ));
        }
        if self.auto_reset_secs == Some(0) {
            return Err(ConfigError::ValidationFailed("CALLBOT_AUTO_RESET_SECS must be > 0"));
        }
        if self
            .auto_reset_secs
            .is_some_and(|secs| secs.saturating_mul(1000) > MAX_PERIOD_MS)
        {
            return Err(ConfigError::ValidationFailed(
                "CALLBOT_AUTO_RESET_SECS must be at most one day",
            ));
        }
        let periods = [
            self.reconnect_max_ms,
            self.connect_timeout_ms,
            self.notice_ms,
            self.blink_ms,
            self.poll_ms,
        ];
        if periods.iter().any(|&ms| ms > MAX_PERIOD_MS) {
            return Err(ConfigError::ValidationFailed(
                "timeouts and periods must be at most one day",
            ));
        }
        if self.connect_timeout_ms == 0 || self.blink_ms == 0 || self.poll_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "timeouts, blink and poll periods must be > 0",
            ));
        }
        Ok(())
    }

    // ── Derived settings ──────────────────────────────────────

    pub fn remote_settings(&self) -> RemoteSettings {
        RemoteSettings {
            poll_interval: Duration::from_millis(self.poll_ms),
            reconnect_initial: Duration::from_millis(self.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(self.reconnect_max_ms),
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            notice_duration: Duration::from_millis(self.notice_ms),
            blink_half_period: Duration::from_millis(self.blink_ms),
            auto_reset_after: self.auto_reset_secs.map(Duration::from_secs),
        }
    }

    pub fn relay_mode(&self) -> RelayMode {
        RelayMode::from_rate(self.gps_rate_hz)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
