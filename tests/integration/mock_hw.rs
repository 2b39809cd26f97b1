//! Mock adapters for integration tests.
//!
//! Time, sensors, Wi-Fi and broker are all scriptable so a test can walk
//! the station through outages and reconnects deterministically.  The
//! broker records every publish for assertions on order and content.

use std::cell::Cell;

use embedded_hal::delay::DelayNs;
use raingauge::app::ports::{IndicatorPort, MqttSession, SensorPort, SystemPort, WifiPort};
use raingauge::app::reading::{Channel, ReadingValue};
use raingauge::clock::{TickSource, TimeSource};
use raingauge::error::{LinkError, SensorError};

/// 2023-11-14 22:13:20 UTC.
pub const EPOCH: u64 = 1_700_000_000;

// ── MockTime ──────────────────────────────────────────────────

/// Wall clock and millisecond tick advanced together.
pub struct MockTime {
    secs: Cell<u64>,
    ticks: Cell<u32>,
}

#[allow(dead_code)]
impl MockTime {
    pub fn new() -> Self {
        Self {
            secs: Cell::new(EPOCH),
            ticks: Cell::new(0),
        }
    }

    pub fn advance_ms(&self, ms: u32) {
        let total = u64::from(self.ticks.get() % 1000) + u64::from(ms);
        self.ticks.set(self.ticks.get().wrapping_add(ms));
        self.secs.set(self.secs.get() + total / 1000);
    }

    pub fn advance_secs(&self, secs: u32) {
        self.advance_ms(secs * 1000);
    }
}

impl TickSource for MockTime {
    fn ticks_ms(&self) -> u32 {
        self.ticks.get()
    }
}

impl TimeSource for MockTime {
    fn unix_secs(&self) -> u64 {
        self.secs.get()
    }
}

// ── MockSensors ───────────────────────────────────────────────

pub struct MockSensors {
    pub values: [Result<ReadingValue, SensorError>; Channel::COUNT],
    pub led_toggles: u32,
    pub uptime: u64,
}

#[allow(dead_code)]
impl MockSensors {
    pub fn new() -> Self {
        Self {
            values: [
                Ok(ReadingValue::Number(95.0)),
                Ok(ReadingValue::Number(70.5)),
                Ok(ReadingValue::Flag(false)),
            ],
            led_toggles: 0,
            uptime: 0,
        }
    }

    pub fn set(&mut self, channel: Channel, value: ReadingValue) {
        self.values[Channel::ALL.iter().position(|c| *c == channel).unwrap()] = Ok(value);
    }

    pub fn fail(&mut self, channel: Channel) {
        self.values[Channel::ALL.iter().position(|c| *c == channel).unwrap()] = Err(SensorError::AdcReadFailed);
    }
}

impl SensorPort for MockSensors {
    fn read(&mut self, channel: Channel) -> Result<ReadingValue, SensorError> {
        self.values[Channel::ALL.iter().position(|c| *c == channel).unwrap()]
    }
}

impl IndicatorPort for MockSensors {
    fn toggle(&mut self) {
        self.led_toggles += 1;
    }
}

impl SystemPort for MockSensors {
    fn uptime_secs(&self) -> u64 {
        self.uptime
    }

    fn free_heap(&self) -> u32 {
        200_000
    }
}

// ── MockWifi ──────────────────────────────────────────────────

pub struct MockWifi {
    pub reachable: bool,
    pub associated: bool,
    pub associations: u32,
}

impl MockWifi {
    pub fn new() -> Self {
        Self {
            reachable: true,
            associated: false,
            associations: 0,
        }
    }
}

impl WifiPort for MockWifi {
    fn begin_association(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
        if self.reachable {
            self.associated = true;
            self.associations += 1;
        }
        Ok(())
    }

    fn is_associated(&self) -> bool {
        self.associated && self.reachable
    }

    fn disassociate(&mut self) {
        self.associated = false;
    }
}

// ── MockBroker ────────────────────────────────────────────────

pub struct MockBroker {
    pub up: bool,
    pub connected: bool,
    /// Publishes that will fail before the broker accepts again.
    pub fail_publishes: u32,
    pub published: Vec<(String, String)>,
    pub connects: u32,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Self {
        Self {
            up: true,
            connected: false,
            fail_publishes: 0,
            published: Vec::new(),
            connects: 0,
        }
    }

    pub fn topics(&self) -> Vec<&str> {
        self.published.iter().map(|(t, _)| t.as_str()).collect()
    }
}

impl MqttSession for MockBroker {
    fn connect(&mut self) -> Result<(), LinkError> {
        if !self.up {
            return Err(LinkError::MqttConnectFailed);
        }
        self.connected = true;
        self.connects += 1;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if self.fail_publishes > 0 {
            self.fail_publishes -= 1;
            return Err(LinkError::PublishFailed);
        }
        self.published
            .push((topic.to_owned(), String::from_utf8(payload.to_vec()).unwrap()));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

// ── MockDelay ─────────────────────────────────────────────────

/// Records requested delays without sleeping.
#[derive(Default)]
pub struct MockDelay {
    pub total_ms: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns.div_ceil(1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}
