//! Solar charger status input.
//!
//! The charger pulls its status pin LOW while charging.  Generic over
//! `embedded_hal::digital::InputPin` so tests drive it with a fake pin.

use embedded_hal::digital::InputPin;

use crate::error::SensorError;

pub struct ChargeStatus<P> {
    pin: P,
}

impl<P: InputPin> ChargeStatus<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// `true` while the battery is charging.
    pub fn is_charging(&mut self) -> Result<bool, SensorError> {
        self.pin.is_low().map_err(|_| SensorError::GpioReadFailed)
    }
}
