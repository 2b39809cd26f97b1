//! Polled sensor channels and the values they report.

use core::fmt;

use serde::Serialize;

use crate::clock::PreciseTime;

/// A polled sensor channel.  The rain gauge is interrupt-driven and is not
/// a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Die temperature of the MCU (°F).
    OnboardTemperature,
    /// External probe temperature (°F).
    Temperature,
    /// Battery charger status pin (`true` = charging).
    ChargeState,
}

impl Channel {
    pub const COUNT: usize = 3;
    pub const ALL: [Self; Self::COUNT] = [
        Self::OnboardTemperature,
        Self::Temperature,
        Self::ChargeState,
    ];

    /// Kind of value this channel must produce.
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::OnboardTemperature | Self::Temperature => ValueKind::Number,
            Self::ChargeState => ValueKind::Flag,
        }
    }

    /// Last topic segment under `<station>/sensor/`.
    pub const fn topic_name(self) -> &'static str {
        match self {
            Self::OnboardTemperature => "onboard_temperature",
            Self::Temperature => "temperature",
            Self::ChargeState => "charge_state",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Flag,
}

/// A sampled value.  Serializes bare (`70.5`, `true`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f32),
    Flag(bool),
}

impl ReadingValue {
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::Number(_) => ValueKind::Number,
            Self::Flag(_) => ValueKind::Flag,
        }
    }

    /// NaN and infinities cannot be compared or encoded as JSON.
    pub fn is_well_formed(self) -> bool {
        match self {
            Self::Number(v) => v.is_finite(),
            Self::Flag(_) => true,
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// One sample, alive for a single cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub channel: Channel,
    pub value: ReadingValue,
    pub timestamp: PreciseTime,
}
