//! Station configuration.
//!
//! Defaults are a working field station apart from network credentials.
//! Provisioning text in `KEY=value` form overlays them (see
//! [`SystemConfig::from_env_str`]); every load is range-checked by
//! [`SystemConfig::validate`] before the station sees it.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::adapters::utils::is_printable_ascii;
use crate::app::message::is_valid_station_id;
use crate::app::outbox::{OUTBOX_MAX_DEPTH, OverflowPolicy};
use crate::app::ports::ConfigError;

pub const DEFAULT_STATION_ID: &str = "rain_gauge_station";

/// Core station configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Identity ---
    /// Topic namespace.  Empty means "derive from the MAC".
    pub station_id: heapless::String<32>,

    // --- Wi-Fi ---
    pub wifi_ssid: heapless::String<32>,
    /// Empty for an open network, otherwise WPA2 8–64 bytes.
    pub wifi_password: heapless::String<64>,
    /// Association checks before giving up for this cycle.
    pub wifi_attempts: u8,
    /// Fixed delay between association checks (ms).
    pub wifi_retry_delay_ms: u32,

    // --- MQTT ---
    pub broker_host: heapless::String<64>,
    pub broker_port: u16,
    /// Empty means "use the station id".
    pub mqtt_client_id: heapless::String<32>,
    pub mqtt_username: heapless::String<32>,
    pub mqtt_password: heapless::String<64>,
    pub mqtt_attempts: u8,
    /// First backoff delay; doubles per failed attempt (ms).
    pub mqtt_retry_delay_ms: u32,
    /// Backoff ceiling (ms).
    pub mqtt_max_backoff_ms: u32,

    // --- Change thresholds (°F) ---
    /// External probe.
    pub temperature_threshold: f32,
    /// On-die sensor.
    pub onboard_temperature_threshold: f32,

    // --- Outbox ---
    pub outbox_capacity: u16,
    pub overflow_policy: OverflowPolicy,

    // --- Timing ---
    pub heartbeat_interval_secs: u32,
    /// Sleep between cycles (ms).
    pub cycle_interval_ms: u32,
    /// Consecutive offline cycles before a shutdown and restart; 0 disables.
    pub reboot_after_offline_cycles: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            station_id: heapless::String::try_from(DEFAULT_STATION_ID).unwrap_or_default(),

            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),
            wifi_attempts: 10,
            wifi_retry_delay_ms: 1_000,

            broker_host: heapless::String::new(),
            broker_port: 1883,
            mqtt_client_id: heapless::String::new(),
            mqtt_username: heapless::String::new(),
            mqtt_password: heapless::String::new(),
            mqtt_attempts: 10,
            mqtt_retry_delay_ms: 3_000,
            mqtt_max_backoff_ms: 60_000,

            temperature_threshold: 0.25,
            onboard_temperature_threshold: 1.0,

            outbox_capacity: OUTBOX_MAX_DEPTH as u16,
            overflow_policy: OverflowPolicy::DropOldest,

            heartbeat_interval_secs: 300,   // 5 min
            cycle_interval_ms: 5_000,       // 0.2 Hz
            reboot_after_offline_cycles: 720, // 1 h at the default cycle
        }
    }
}

impl SystemConfig {
    /// Overlay `KEY=value` lines onto the defaults, then validate.
    ///
    /// Blank lines and `#` comments are skipped, an `export ` prefix and
    /// matching surrounding quotes are stripped.  Unknown keys are logged
    /// and ignored.
    pub fn from_env_str(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line
                .split_once('=')
                .ok_or(ConfigError::ValidationFailed("line is not KEY=value"))?;
            config.apply(key.trim(), unquote(value.trim()))?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "STATION_ID" => set(&mut self.station_id, value, "STATION_ID longer than 32 bytes"),
            "WIFI_SSID" => set(&mut self.wifi_ssid, value, "WIFI_SSID longer than 32 bytes"),
            "WIFI_PASSWORD" => set(&mut self.wifi_password, value, "WIFI_PASSWORD longer than 64 bytes"),
            "WIFI_ATTEMPTS" => num(&mut self.wifi_attempts, value, "WIFI_ATTEMPTS is not a number"),
            "WIFI_RETRY_DELAY_MS" => num(&mut self.wifi_retry_delay_ms, value, "WIFI_RETRY_DELAY_MS is not a number"),
            "MQTT_BROKER_IP" | "MQTT_BROKER_HOST" => {
                set(&mut self.broker_host, value, "MQTT broker host longer than 64 bytes")
            }
            "MQTT_BROKER_PORT" => num(&mut self.broker_port, value, "MQTT_BROKER_PORT is not a port number"),
            "MQTT_CLIENT_ID" => set(&mut self.mqtt_client_id, value, "MQTT_CLIENT_ID longer than 32 bytes"),
            "MQTT_USERNAME" => set(&mut self.mqtt_username, value, "MQTT_USERNAME longer than 32 bytes"),
            "MQTT_PASSWORD" => set(&mut self.mqtt_password, value, "MQTT_PASSWORD longer than 64 bytes"),
            "MQTT_ATTEMPTS" => num(&mut self.mqtt_attempts, value, "MQTT_ATTEMPTS is not a number"),
            "MQTT_RETRY_DELAY_MS" => num(&mut self.mqtt_retry_delay_ms, value, "MQTT_RETRY_DELAY_MS is not a number"),
            "MQTT_MAX_BACKOFF_MS" => num(&mut self.mqtt_max_backoff_ms, value, "MQTT_MAX_BACKOFF_MS is not a number"),
            "TEMPERATURE_THRESHOLD" => {
                num(&mut self.temperature_threshold, value, "TEMPERATURE_THRESHOLD is not a number")
            }
            "ONBOARD_TEMPERATURE_THRESHOLD" => num(
                &mut self.onboard_temperature_threshold,
                value,
                "ONBOARD_TEMPERATURE_THRESHOLD is not a number",
            ),
            "HEARTBEAT_INTERVAL_SECS" => {
                num(&mut self.heartbeat_interval_secs, value, "HEARTBEAT_INTERVAL_SECS is not a number")
            }
            "CYCLE_INTERVAL_MS" => num(&mut self.cycle_interval_ms, value, "CYCLE_INTERVAL_MS is not a number"),
            "OUTBOX_CAPACITY" => num(&mut self.outbox_capacity, value, "OUTBOX_CAPACITY is not a number"),
            "OUTBOX_OVERFLOW" => {
                self.overflow_policy = OverflowPolicy::from_name(value)
                    .ok_or(ConfigError::ValidationFailed("OUTBOX_OVERFLOW must be drop_oldest or drop_newest"))?;
                Ok(())
            }
            "REBOOT_AFTER_OFFLINE_CYCLES" => num(
                &mut self.reboot_after_offline_cycles,
                value,
                "REBOOT_AFTER_OFFLINE_CYCLES is not a number",
            ),
            _ => {
                warn!("Config: ignoring unknown key '{}'", key);
                Ok(())
            }
        }
    }

    /// Range-check every field.  Out-of-range values are rejected, never
    /// clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.station_id.is_empty() && !is_valid_station_id(&self.station_id) {
            return Err(ConfigError::ValidationFailed(
                "station_id must be printable with no spaces, '/', '+' or '#'",
            ));
        }
        if !is_printable_ascii(&self.wifi_ssid) {
            return Err(ConfigError::ValidationFailed("wifi_ssid must be printable ASCII"));
        }
        if !self.wifi_password.is_empty() && self.wifi_password.len() < 8 {
            return Err(ConfigError::ValidationFailed(
                "wifi_password must be empty or 8–64 bytes",
            ));
        }
        if !is_printable_ascii(&self.wifi_password) {
            return Err(ConfigError::ValidationFailed("wifi_password must be printable ASCII"));
        }
        if self.wifi_attempts == 0 {
            return Err(ConfigError::ValidationFailed("wifi_attempts must be at least 1"));
        }
        if self.broker_host.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed("broker_host must not contain spaces"));
        }
        if self.broker_port == 0 {
            return Err(ConfigError::ValidationFailed("broker_port must be non-zero"));
        }
        if !self.mqtt_client_id.is_empty() && !is_valid_station_id(&self.mqtt_client_id) {
            return Err(ConfigError::ValidationFailed("mqtt_client_id must be printable with no spaces"));
        }
        if self.mqtt_attempts == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_attempts must be at least 1"));
        }
        if self.mqtt_max_backoff_ms < self.mqtt_retry_delay_ms {
            return Err(ConfigError::ValidationFailed(
                "mqtt_max_backoff_ms must be >= mqtt_retry_delay_ms",
            ));
        }
        if !(self.temperature_threshold.is_finite() && self.temperature_threshold >= 0.0) {
            return Err(ConfigError::ValidationFailed(
                "temperature_threshold must be a finite value >= 0",
            ));
        }
        if !(self.onboard_temperature_threshold.is_finite() && self.onboard_temperature_threshold >= 0.0) {
            return Err(ConfigError::ValidationFailed(
                "onboard_temperature_threshold must be a finite value >= 0",
            ));
        }
        if !(1..=OUTBOX_MAX_DEPTH).contains(&usize::from(self.outbox_capacity)) {
            return Err(ConfigError::ValidationFailed("outbox_capacity must be 1–48"));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("heartbeat_interval_secs must be at least 1"));
        }
        if !(100..=3_600_000).contains(&self.cycle_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "cycle_interval_ms must be 100–3600000",
            ));
        }
        Ok(())
    }

    /// Client id presented to the broker.
    pub fn client_id(&self) -> &str {
        if self.mqtt_client_id.is_empty() {
            &self.station_id
        } else {
            &self.mqtt_client_id
        }
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

fn set<const N: usize>(
    field: &mut heapless::String<N>,
    value: &str,
    too_long: &'static str,
) -> Result<(), ConfigError> {
    *field = heapless::String::try_from(value).map_err(|()| ConfigError::ValidationFailed(too_long))?;
    Ok(())
}

fn num<T: core::str::FromStr>(field: &mut T, value: &str, bad: &'static str) -> Result<(), ConfigError> {
    *field = value.parse().map_err(|_| ConfigError::ValidationFailed(bad))?;
    Ok(())
}
