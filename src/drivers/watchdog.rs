//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the main loop
//! stalls for more than [`WATCHDOG_TIMEOUT_MS`].
//!
//! Network retries can block the loop for minutes, so every delay the
//! station takes goes through [`WatchdogDelay`], which sleeps in short
//! slices and feeds the watchdog between them.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use embedded_hal::delay::DelayNs;

pub const WATCHDOG_TIMEOUT_MS: u32 = 30_000;

/// Longest single sleep between feeds.
pub const FEED_SLICE_MS: u32 = 1_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK as i32 {
                    log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK as i32;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", WATCHDOG_TIMEOUT_MS);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op");
            Self {}
        }
    }

    /// Feed the watchdog.  Must be called at least every
    /// [`WATCHDOG_TIMEOUT_MS`].
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

// ── Feeding delay ─────────────────────────────────────────────

/// `DelayNs` that keeps the watchdog fed across long waits.
pub struct WatchdogDelay<'a> {
    watchdog: &'a Watchdog,
}

impl<'a> WatchdogDelay<'a> {
    pub fn new(watchdog: &'a Watchdog) -> Self {
        Self { watchdog }
    }

    fn sleep_ms(ms: u32) {
        #[cfg(target_os = "espidf")]
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);

        #[cfg(not(target_os = "espidf"))]
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

impl DelayNs for WatchdogDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        // Sub-millisecond waits round up to one tick slice.
        self.delay_ms(ns.div_ceil(1_000_000));
    }

    fn delay_ms(&mut self, mut ms: u32) {
        while ms > 0 {
            let slice = ms.min(FEED_SLICE_MS);
            Self::sleep_ms(slice);
            self.watchdog.feed();
            ms -= slice;
        }
    }
}
