//! Port traits: the hexagonal boundary between the station core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ StationService (domain)
//! ```
//!
//! Hardware, radio and broker adapters implement these traits.  The
//! [`StationService`](super::service::StationService) consumes them via
//! generics, so the core never touches a peripheral directly and every
//! path runs on the host against mocks.

use crate::app::reading::{Channel, ReadingValue};
use crate::config::SystemConfig;
use crate::error::{LinkError, SensorError};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Polled sensors.  The rain gauge is interrupt-driven and not read here.
pub trait SensorPort {
    /// Sample one channel.  Errors skip the channel for the current cycle.
    fn read(&mut self, channel: Channel) -> Result<ReadingValue, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Indicator + system ports
// ───────────────────────────────────────────────────────────────

/// Liveness indicator, toggled once per cycle.
pub trait IndicatorPort {
    fn toggle(&mut self);
}

/// Chip-level health figures reported in heartbeats.
pub trait SystemPort {
    /// Seconds since boot.
    fn uptime_secs(&self) -> u64;
    /// Free heap in bytes.
    fn free_heap(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Network ports (driven adapters: domain → radio / broker)
// ───────────────────────────────────────────────────────────────

/// Wi-Fi station interface.  Association is started here and polled by the
/// [`Link`](super::link::Link), which owns the retry budget.
pub trait WifiPort {
    /// Apply credentials and start associating.  Returns once the attempt is
    /// under way, not when it completes.
    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    /// Associated with an AP and holding an IP address.
    fn is_associated(&self) -> bool;

    fn disassociate(&mut self);
}

/// One MQTT client session.  Implementations own the wire protocol.
pub trait MqttSession {
    /// Open a session.  Blocks until established or failed.
    fn connect(&mut self) -> Result<(), LinkError>;

    /// Send one message.  Success or failure is known synchronously.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError>;

    /// Close the session.  Safe to call when already closed.
    fn disconnect(&mut self);
}

/// Something the outbox can flush into.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: provisioning → domain)
// ───────────────────────────────────────────────────────────────

/// Source of the station configuration.
///
/// Implementations MUST validate before returning; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    fn load(&self) -> Result<SystemConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations and provisioning parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No provisioning data present.
    NotFound,
    /// A config field failed parsing or range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
