//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every polled driver and answers one [`Channel`] at a time
//! with a value in the units the station publishes (°F, two decimals).

pub mod charge;
pub mod onboard;
pub mod temperature;

use embedded_hal::digital::InputPin;

use crate::app::reading::{Channel, ReadingValue};
use crate::error::SensorError;
use charge::ChargeStatus;
use onboard::OnboardSensor;
use temperature::ProbeSensor;

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Round to two decimal places.
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Aggregates the polled sensor drivers.
pub struct SensorHub<P> {
    pub onboard: OnboardSensor,
    pub probe: ProbeSensor,
    pub charge: ChargeStatus<P>,
}

impl<P: InputPin> SensorHub<P> {
    /// Construct a new hub.  Pass in pre-built drivers (built in main
    /// where peripheral ownership is established).
    pub fn new(onboard: OnboardSensor, probe: ProbeSensor, charge: ChargeStatus<P>) -> Self {
        Self {
            onboard,
            probe,
            charge,
        }
    }

    /// Sample one channel.  The caller skips a failed channel for this
    /// cycle.
    pub fn read(&mut self, channel: Channel) -> Result<ReadingValue, SensorError> {
        match channel {
            Channel::OnboardTemperature => self.onboard.read_celsius().map(to_published),
            Channel::Temperature => self.probe.read_celsius().map(to_published),
            Channel::ChargeState => self.charge.is_charging().map(ReadingValue::Flag),
        }
    }
}

fn to_published(celsius: f32) -> ReadingValue {
    ReadingValue::Number(round2(celsius_to_fahrenheit(celsius)))
}
