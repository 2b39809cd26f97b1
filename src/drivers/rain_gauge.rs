//! Tipping-bucket rain gauge interrupt.
//!
//! Registers a falling-edge ISR on [`pins::RAIN_GAUGE_GPIO`] that feeds the
//! ISR half of the tip buffer.  The handler only reads the millisecond tick
//! and pushes it; resolving ticks to timestamps happens in the main loop.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

use super::hw_init::HwInitError;
use crate::adapters::time::EspTimeSource;
use crate::events::{TipProducer, TIP_BUFFER_CAPACITY};
#[cfg(target_os = "espidf")]
use crate::pins;

/// The producer half owned by the ISR for the life of the program.
pub type GaugeProducer = TipProducer<'static, EspTimeSource, TIP_BUFFER_CAPACITY>;

#[cfg(target_os = "espidf")]
unsafe extern "C" fn rain_tip_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked producer registered in `install`.  This
    // handler is its only user and GPIO ISRs on one pin do not nest.
    let producer = unsafe { &mut *arg.cast::<GaugeProducer>() };
    let _ = producer.on_tip();
}

/// Hand the producer to the GPIO ISR.  Call once, after
/// [`init_peripherals`](super::hw_init::init_peripherals).
#[cfg(target_os = "espidf")]
pub fn install(producer: GaugeProducer) -> Result<(), HwInitError> {
    let producer: &'static mut GaugeProducer = Box::leak(Box::new(producer));
    let arg: *mut GaugeProducer = producer;

    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  `arg` points at a leaked allocation
    // that outlives the handler.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_set_intr_type(pins::RAIN_GAUGE_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE);
        let ret = gpio_isr_handler_add(pins::RAIN_GAUGE_GPIO, Some(rain_tip_isr), arg.cast());
        if ret != ESP_OK as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(pins::RAIN_GAUGE_GPIO);
    }

    info!("RainGauge: ISR installed on GPIO{}", pins::RAIN_GAUGE_GPIO);
    Ok(())
}

/// Simulation: no interrupt source; the producer is dropped and tips
/// never arrive.
#[cfg(not(target_os = "espidf"))]
pub fn install(producer: GaugeProducer) -> Result<(), HwInitError> {
    drop(producer);
    info!("RainGauge(sim): ISR skipped");
    Ok(())
}
