//! NTC thermistor probe (10 kOhm @ 25 C, B = 3950).
//!
//! Wired in a voltage-divider with a fixed 10 kOhm resistor, read via
//! the ESP32-S3 ADC. The simplified Beta (Steinhart-Hart) equation
//! converts resistance to temperature.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1_CH8 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static AtomicU16 for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;
#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(not(target_os = "espidf"))]
static SIM_PROBE_ADC: AtomicU16 = AtomicU16::new(2048);

/// Simulation: inject the next raw ADC sample.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_probe_adc(raw: u16) {
    SIM_PROBE_ADC.store(raw, Ordering::Relaxed);
}

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// Readings within this distance of either rail mean an open or shorted
/// probe.
const RAIL_MARGIN_V: f32 = 0.01;

#[derive(Debug, Default)]
pub struct ProbeSensor;

impl ProbeSensor {
    pub fn new() -> Self {
        Self
    }

    /// Probe temperature in °C.
    pub fn read_celsius(&self) -> Result<f32, SensorError> {
        adc_to_celsius(Self::read_adc()?)
    }

    #[cfg(target_os = "espidf")]
    fn read_adc() -> Result<u16, SensorError> {
        hw_init::adc1_read(pins::PROBE_ADC_CHANNEL)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc() -> Result<u16, SensorError> {
        Ok(SIM_PROBE_ADC.load(Ordering::Relaxed))
    }
}

fn adc_to_celsius(raw: u16) -> Result<f32, SensorError> {
    let voltage = (f32::from(raw) / ADC_MAX) * V_REF;
    if voltage <= RAIL_MARGIN_V || voltage >= (V_REF - RAIL_MARGIN_V) {
        return Err(SensorError::OutOfRange);
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return Err(SensorError::OutOfRange);
    }
    Ok((1.0 / inv_t) - 273.15)
}
