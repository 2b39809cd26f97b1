//! ESP32-S3 on-die temperature sensor.
//!
//! On ESP-IDF: the `driver/temperature_sensor.h` API, installed for the
//! -10..80 °C range.  On host/test: a static f32 (stored as bits) for
//! injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::drivers::hw_init::HwInitError;
use crate::error::SensorError;

/// Measurement range the sensor is calibrated for.
pub const RANGE_MIN_C: i32 = -10;
pub const RANGE_MAX_C: i32 = 80;

/// 30.0 °C.
#[cfg(not(target_os = "espidf"))]
static SIM_DIE_CELSIUS: AtomicU32 = AtomicU32::new(0x41F0_0000);

/// Simulation: set the die temperature the next read returns.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_die_celsius(celsius: f32) {
    SIM_DIE_CELSIUS.store(celsius.to_bits(), Ordering::Relaxed);
}

pub struct OnboardSensor {
    #[cfg(target_os = "espidf")]
    handle: temperature_sensor_handle_t,
}

#[cfg(target_os = "espidf")]
impl OnboardSensor {
    pub fn new() -> Result<Self, HwInitError> {
        let cfg = temperature_sensor_config_t {
            range_min: RANGE_MIN_C,
            range_max: RANGE_MAX_C,
            clk_src: soc_periph_temperature_sensor_clk_src_t_TEMPERATURE_SENSOR_CLK_SRC_DEFAULT,
            ..Default::default()
        };
        let mut handle: temperature_sensor_handle_t = core::ptr::null_mut();
        // SAFETY: `cfg` and `handle` are valid for the call; the handle is
        // owned by this struct afterwards.
        let ret = unsafe { temperature_sensor_install(&cfg, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::TempSensorFailed(ret));
        }
        let ret = unsafe { temperature_sensor_enable(handle) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::TempSensorFailed(ret));
        }
        log::info!("Onboard: die sensor enabled ({}..{} C)", RANGE_MIN_C, RANGE_MAX_C);
        Ok(Self { handle })
    }

    /// Die temperature in °C.
    pub fn read_celsius(&self) -> Result<f32, SensorError> {
        let mut celsius: f32 = 0.0;
        // SAFETY: handle was installed and enabled in `new`.
        let ret = unsafe { temperature_sensor_get_celsius(self.handle, &mut celsius) };
        if ret != ESP_OK as i32 {
            return Err(SensorError::AdcReadFailed);
        }
        Ok(celsius)
    }
}

#[cfg(not(target_os = "espidf"))]
impl OnboardSensor {
    pub fn new() -> Result<Self, HwInitError> {
        Ok(Self {})
    }

    /// Die temperature in °C.
    pub fn read_celsius(&self) -> Result<f32, SensorError> {
        let celsius = f32::from_bits(SIM_DIE_CELSIUS.load(Ordering::Relaxed));
        if celsius.is_nan() {
            return Err(SensorError::AdcReadFailed);
        }
        Ok(celsius)
    }
}
