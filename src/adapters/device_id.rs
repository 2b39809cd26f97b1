//! Station identity derived from the ESP32 factory MAC address.
//!
//! Used when provisioning leaves `STATION_ID` empty.  The ID is
//! `rg-xxyyzz` (last 3 bytes of the 6-byte MAC in lowercase hex), which is
//! stable across reboots and valid as an MQTT topic segment and client ID.

use core::fmt::Write;

use crate::app::message::StationId;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a valid 6-byte out-buffer.
    let ret = unsafe { esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) };
    if ret != esp_idf_svc::sys::ESP_OK as i32 {
        log::warn!("DeviceId: eFuse MAC read failed ({})", ret);
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the station ID from the last 3 MAC bytes.
/// Format: `rg-xxyyzz` (e.g., `rg-efcafe`).
pub fn station_id(mac: &MacAddress) -> StationId {
    let mut id = StationId::new();
    // 9 bytes always fits.
    let _ = write!(id, "rg-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}
