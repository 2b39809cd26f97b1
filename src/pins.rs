//! GPIO / peripheral pin assignments for the rain gauge station board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Rain gauge (tipping bucket reed switch to GND)
// ---------------------------------------------------------------------------

/// Digital input with internal pull-up.  Each bucket tip closes the reed
/// switch briefly: one falling edge per tip.
pub const RAIN_GAUGE_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// Solar charger
// ---------------------------------------------------------------------------

/// Charger status output (open drain).  LOW = charging.
pub const CHARGE_STATUS_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// Sensors: analog (ADC1)
// ---------------------------------------------------------------------------

/// NTC thermistor probe, 10 kΩ @ 25 °C, voltage-divider to ADC.
/// ADC1 channel 8 (GPIO 9 on ESP32-S3).
pub const PROBE_ADC_GPIO: i32 = 9;
/// ADC1 channel number for [`PROBE_ADC_GPIO`].
pub const PROBE_ADC_CHANNEL: u32 = 8;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Single discrete LED, active HIGH.  Toggled once per cycle.
pub const STATUS_LED_GPIO: i32 = 2;
