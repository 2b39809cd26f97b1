//! Boot reason, health figures and runtime counters.
//!
//! The boot status message carries a [`BootReason`] read from the chip's
//! reset reason register.  Heartbeats carry a subset of [`StationMetrics`];
//! the full snapshot is logged alongside every heartbeat.

use core::fmt;

use serde::Serialize;

// ───────────────────────────────────────────────────────────────
// Boot reason
// ───────────────────────────────────────────────────────────────

/// Why the chip last came out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootReason {
    PowerOn,
    SoftwareReset,
    Watchdog,
    Brownout,
    Panic,
    DeepSleep,
    Other,
}

impl BootReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PowerOn => "power_on",
            Self::SoftwareReset => "software_reset",
            Self::Watchdog => "watchdog",
            Self::Brownout => "brownout",
            Self::Panic => "panic",
            Self::DeepSleep => "deep_sleep",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for BootReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(target_os = "espidf")]
#[allow(non_upper_case_globals)]
pub fn read_boot_reason() -> BootReason {
    use esp_idf_svc::sys::*;
    // SAFETY: reads a register latched at reset; no preconditions.
    let reason = unsafe { esp_reset_reason() };
    match reason {
        esp_reset_reason_t_ESP_RST_POWERON => BootReason::PowerOn,
        esp_reset_reason_t_ESP_RST_SW => BootReason::SoftwareReset,
        esp_reset_reason_t_ESP_RST_INT_WDT
        | esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_WDT => BootReason::Watchdog,
        esp_reset_reason_t_ESP_RST_BROWNOUT => BootReason::Brownout,
        esp_reset_reason_t_ESP_RST_PANIC => BootReason::Panic,
        esp_reset_reason_t_ESP_RST_DEEPSLEEP => BootReason::DeepSleep,
        _ => BootReason::Other,
    }
}

/// Simulation always boots from power-on.
#[cfg(not(target_os = "espidf"))]
pub fn read_boot_reason() -> BootReason {
    BootReason::PowerOn
}

// ───────────────────────────────────────────────────────────────
// Heap
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn free_heap() -> u32 {
    // SAFETY: allocator statistics query, callable from any task.
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

/// Simulation: a fixed 300 KB.
#[cfg(not(target_os = "espidf"))]
pub fn free_heap() -> u32 {
    307_200
}

// ───────────────────────────────────────────────────────────────
// Counters snapshot
// ───────────────────────────────────────────────────────────────

/// Point-in-time health of the station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationMetrics {
    pub uptime_secs: u64,
    pub heap_free: u32,
    pub cycles: u64,
    /// Messages waiting in the outbox.
    pub queued: u16,
    /// Tips lost to a full capture ring.
    pub dropped_tips: u32,
    /// Messages evicted or refused by the outbox overflow policy.
    pub dropped_messages: u32,
    /// Messages that could not be built within their size bounds.
    pub rejected_messages: u32,
    pub malformed_readings: u32,
    pub sessions: u32,
    pub connect_failures: u32,
    pub publish_failures: u32,
}

impl fmt::Display for StationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "up={}s heap={}B cycles={} queued={} drops(tips={} msgs={} rejected={}) malformed={} \
             sessions={} connect_fail={} publish_fail={}",
            self.uptime_secs,
            self.heap_free,
            self.cycles,
            self.queued,
            self.dropped_tips,
            self.dropped_messages,
            self.rejected_messages,
            self.malformed_readings,
            self.sessions,
            self.connect_failures,
            self.publish_failures,
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Log the panic message before the default handler resets the chip.
/// The next boot reports [`BootReason::Panic`].
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC at {}:{}: {}", loc.file(), loc.line(), reason),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
