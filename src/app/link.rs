//! Connectivity manager: Wi-Fi association and the MQTT session.
//!
//! ```text
//!   Disconnected ──ensure_connected──▶ Connecting ──ok──▶ Connected
//!        ▲                                 │                  │
//!        └───────── budget exhausted ──────┘                  │
//!        └──────────── publish failure / teardown ────────────┘
//! ```
//!
//! Every retry delay goes through the caller's [`DelayNs`], so the watchdog
//! keeps being fed during long reconnects and tests run without sleeping.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::ports::{MqttSession, Publisher, WifiPort};
use crate::config::SystemConfig;
use crate::error::LinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Credentials and retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    pub wifi_attempts: u8,
    pub wifi_retry_delay_ms: u32,
    pub mqtt_attempts: u8,
    pub mqtt_retry_delay_ms: u32,
    pub mqtt_max_backoff_ms: u32,
}

impl LinkSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            ssid: config.wifi_ssid.clone(),
            password: config.wifi_password.clone(),
            wifi_attempts: config.wifi_attempts.max(1),
            wifi_retry_delay_ms: config.wifi_retry_delay_ms,
            mqtt_attempts: config.mqtt_attempts.max(1),
            mqtt_retry_delay_ms: config.mqtt_retry_delay_ms,
            mqtt_max_backoff_ms: config.mqtt_max_backoff_ms.max(config.mqtt_retry_delay_ms),
        }
    }

    /// Delay after failed MQTT attempt `attempt` (0-based): doubles from the
    /// base delay, capped at the maximum.
    pub fn mqtt_backoff_ms(&self, attempt: u8) -> u32 {
        let factor = 1u32.checked_shl(u32::from(attempt)).unwrap_or(u32::MAX);
        self.mqtt_retry_delay_ms
            .saturating_mul(factor)
            .min(self.mqtt_max_backoff_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sessions: u32,
    pub connect_failures: u32,
    pub publish_failures: u32,
}

pub struct Link<W, M> {
    wifi: W,
    session: M,
    settings: LinkSettings,
    state: ConnectionState,
    stats: LinkStats,
}

impl<W: WifiPort, M: MqttSession> Link<W, M> {
    pub fn new(wifi: W, session: M, settings: LinkSettings) -> Self {
        Self {
            wifi,
            session,
            settings,
            state: ConnectionState::Disconnected,
            stats: LinkStats::default(),
        }
    }

    /// Return a live session, establishing one first if needed.  `None`
    /// means the retry budget ran out; try again next cycle.
    pub fn ensure_connected(&mut self, delay: &mut impl DelayNs) -> Option<&mut M> {
        if self.state == ConnectionState::Connected {
            if self.wifi.is_associated() {
                return Some(&mut self.session);
            }
            warn!("Link: Wi-Fi dropped, session abandoned");
            self.invalidate();
        }

        self.state = ConnectionState::Connecting;
        match self.connect(delay) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.stats.sessions = self.stats.sessions.saturating_add(1);
                info!("Link: connected (session #{})", self.stats.sessions);
                Some(&mut self.session)
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                self.stats.connect_failures = self.stats.connect_failures.saturating_add(1);
                warn!("Link: connect failed: {}", e);
                None
            }
        }
    }

    fn connect(&mut self, delay: &mut impl DelayNs) -> Result<(), LinkError> {
        if !self.wifi.is_associated() {
            self.associate(delay)?;
        }
        self.open_session(delay)
    }

    fn associate(&mut self, delay: &mut impl DelayNs) -> Result<(), LinkError> {
        if self.settings.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        info!("Link: associating with '{}'", self.settings.ssid);
        self.wifi
            .begin_association(&self.settings.ssid, &self.settings.password)?;

        for attempt in 1..=self.settings.wifi_attempts {
            if self.wifi.is_associated() {
                info!("Link: Wi-Fi up after {} check(s)", attempt);
                return Ok(());
            }
            delay.delay_ms(self.settings.wifi_retry_delay_ms);
        }
        if self.wifi.is_associated() {
            return Ok(());
        }
        self.wifi.disassociate();
        Err(LinkError::WifiTimeout)
    }

    fn open_session(&mut self, delay: &mut impl DelayNs) -> Result<(), LinkError> {
        let attempts = self.settings.mqtt_attempts;
        let mut last = LinkError::MqttConnectFailed;
        for attempt in 0..attempts {
            match self.session.connect() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last = e;
                    if attempt + 1 < attempts {
                        let wait = self.settings.mqtt_backoff_ms(attempt);
                        warn!("Link: MQTT attempt {}/{} failed ({}), retry in {} ms", attempt + 1, attempts, e, wait);
                        delay.delay_ms(wait);
                    }
                }
            }
        }
        Err(last)
    }

    /// Drop the session so the next `ensure_connected` reconnects.  Wi-Fi
    /// association is kept.
    pub fn invalidate(&mut self) {
        self.session.disconnect();
        self.state = ConnectionState::Disconnected;
    }

    /// Close the session and leave the network.
    pub fn teardown(&mut self) {
        self.session.disconnect();
        self.wifi.disassociate();
        self.state = ConnectionState::Disconnected;
        info!("Link: torn down");
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut W {
        &mut self.wifi
    }

    pub fn session(&self) -> &M {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut M {
        &mut self.session
    }
}

/// Publishing through the link marks the session suspect on any failure.
impl<W: WifiPort, M: MqttSession> Publisher for Link<W, M> {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        if self.state != ConnectionState::Connected {
            return Err(LinkError::NotConnected);
        }
        self.session.publish(topic, payload).inspect_err(|_| {
            self.stats.publish_failures = self.stats.publish_failures.saturating_add(1);
            self.session.disconnect();
            self.state = ConnectionState::Disconnected;
        })
    }
}
