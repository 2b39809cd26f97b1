//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the status LED, exposing them through
//! [`SensorPort`], [`IndicatorPort`] and [`SystemPort`].  This is the only
//! module in the system that touches sensor hardware.  On non-espidf
//! targets, the underlying drivers use cfg-gated simulation stubs.

use embedded_hal::digital::InputPin;

use crate::adapters::time::EspTimeSource;
use crate::app::ports::{IndicatorPort, SensorPort, SystemPort};
use crate::app::reading::{Channel, ReadingValue};
use crate::diagnostics;
use crate::drivers::status_led::StatusLed;
use crate::error::SensorError;
use crate::sensors::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P> {
    sensor_hub: SensorHub<P>,
    led: StatusLed,
    time: EspTimeSource,
}

impl<P: InputPin> HardwareAdapter<P> {
    pub fn new(sensor_hub: SensorHub<P>, led: StatusLed, time: EspTimeSource) -> Self {
        Self {
            sensor_hub,
            led,
            time,
        }
    }

    pub fn led(&self) -> &StatusLed {
        &self.led
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<P: InputPin> SensorPort for HardwareAdapter<P> {
    fn read(&mut self, channel: Channel) -> Result<ReadingValue, SensorError> {
        self.sensor_hub.read(channel)
    }
}

// ── IndicatorPort / SystemPort ────────────────────────────────

impl<P> IndicatorPort for HardwareAdapter<P> {
    fn toggle(&mut self) {
        self.led.toggle();
    }
}

impl<P> SystemPort for HardwareAdapter<P> {
    fn uptime_secs(&self) -> u64 {
        self.time.uptime_secs()
    }

    fn free_heap(&self) -> u32 {
        diagnostics::free_heap()
    }
}
