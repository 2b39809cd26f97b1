//! Error types for the rain gauge firmware.
//!
//! Each subsystem has a small `Copy` enum with a hand-written `Display`;
//! the top-level [`Error`] collects them for startup paths.  None of these
//! ever escape the control loop: sensor failures skip a channel, link
//! failures wait for the next cycle.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned out-of-range data.
    Sensor(SensorError),
    /// Wi-Fi or MQTT failure.
    Link(LinkError),
    /// A message could not be built within its bounds.
    Message(MessageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Message(e) => write!(f, "message: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// GPIO read returned an error.
    GpioReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Sensor driver was never brought up.
    NotReady,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotReady => write!(f, "sensor not initialised"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No SSID provisioned.
    NoCredentials,
    /// SSID or password rejected before reaching the radio.
    InvalidCredentials,
    /// Association did not complete within the attempt budget.
    WifiTimeout,
    /// The Wi-Fi driver returned an error.
    WifiFailed,
    /// No broker host provisioned.
    NoBroker,
    /// MQTT session could not be established.
    MqttConnectFailed,
    /// Publish attempted without a session.
    NotConnected,
    /// The session rejected or failed to send a publish.
    PublishFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no Wi-Fi credentials configured"),
            Self::InvalidCredentials => {
                write!(f, "Wi-Fi credentials invalid (SSID 1-32 printable bytes, password empty or 8-64 bytes)")
            }
            Self::WifiTimeout => write!(f, "Wi-Fi association timed out"),
            Self::WifiFailed => write!(f, "Wi-Fi driver error"),
            Self::NoBroker => write!(f, "no MQTT broker configured"),
            Self::MqttConnectFailed => write!(f, "MQTT connect failed"),
            Self::NotConnected => write!(f, "no MQTT session"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Message errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    /// Station id empty, too long, or contains MQTT wildcard/level characters.
    InvalidStationId,
    /// Topic exceeds its fixed capacity.
    TopicTooLong,
    /// Serialized payload exceeds its fixed capacity (actual size attached).
    PayloadTooLarge(usize),
    /// JSON encoding failed.
    Encode,
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStationId => write!(f, "station id invalid"),
            Self::TopicTooLong => write!(f, "topic too long"),
            Self::PayloadTooLarge(n) => write!(f, "payload of {n} bytes too large"),
            Self::Encode => write!(f, "JSON encoding failed"),
        }
    }
}

impl From<MessageError> for Error {
    fn from(e: MessageError) -> Self {
        Self::Message(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
