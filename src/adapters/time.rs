//! ESP32 time adapter.
//!
//! Implements [`TickSource`] and [`TimeSource`] for the station clock.
//!
//! - **`target_os = "espidf"`**: the millisecond tick comes from
//!   `esp_timer_get_time()` (ISR-safe, monotonic); wall-clock seconds from
//!   `gettimeofday`, which SNTP sets after the first association.
//! - **`not(target_os = "espidf")`**: `std::time` for host-side simulation.

use crate::clock::{TickSource, TimeSource};

/// Time adapter for the ESP32-S3 platform.  Stateless on device, so the
/// tip ISR and the main loop each hold their own copy.
#[derive(Debug, Clone, Copy)]
pub struct EspTimeSource {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for EspTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EspTimeSource {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: reads the high-resolution timer; callable from ISRs.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Seconds since boot (monotonic).
    pub fn uptime_secs(&self) -> u64 {
        self.uptime_us() / 1_000_000
    }
}

impl TickSource for EspTimeSource {
    fn ticks_ms(&self) -> u32 {
        // Truncation is the wrap.
        (self.uptime_us() / 1_000) as u32
    }
}

impl TimeSource for EspTimeSource {
    #[cfg(target_os = "espidf")]
    fn unix_secs(&self) -> u64 {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: `tv` is a valid out-pointer; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return 0;
        }
        u64::try_from(tv.tv_sec).unwrap_or(0)
    }

    #[cfg(not(target_os = "espidf"))]
    fn unix_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
