//! Status LED driver.
//!
//! One discrete LED on [`pins::STATUS_LED_GPIO`], toggled once per station
//! cycle as a heartbeat.
//!
//! On ESP-IDF: drives the GPIO configured in hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Default)]
pub struct StatusLed {
    on: bool,
}

impl StatusLed {
    pub fn new() -> Self {
        Self { on: false }
    }

    pub fn set(&mut self, on: bool) {
        hw_init::gpio_write(pins::STATUS_LED_GPIO, on);
        self.on = on;
    }

    pub fn toggle(&mut self) {
        self.set(!self.on);
    }

    pub fn off(&mut self) {
        self.set(false);
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
