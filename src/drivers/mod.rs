//! Hardware initialisation, the rain gauge interrupt, and peripheral
//! helpers.

pub mod hw_init;
pub mod rain_gauge;
pub mod status_led;
pub mod watchdog;
