//! Wi-Fi station-mode adapter.
//!
//! Implements [`WifiPort`]: apply credentials, start a non-blocking
//! association, report whether the interface is up.  Polling and retry
//! budgets live in the [`Link`](crate::app::link::Link).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in STA mode.
//! - **all other targets**: simulation with a reachability knob for
//!   host-side runs.

use log::{info, warn};

use super::utils::is_printable_ascii;
use crate::app::ports::WifiPort;
use crate::error::LinkError;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() {
        return Err(LinkError::NoCredentials);
    }
    if ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidCredentials);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidCredentials);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    /// Simulation: whether the AP answers.
    #[cfg(not(target_os = "espidf"))]
    reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    associated: bool,
    #[cfg(not(target_os = "espidf"))]
    associations: u32,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: esp_idf_svc::wifi::EspWifi<'static>) -> Self {
        Self { wifi }
    }

    fn platform_begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::InvalidCredentials)?,
            password: password.try_into().map_err(|_| LinkError::InvalidCredentials)?,
            auth_method,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|e| {
                warn!("WiFi: set_configuration failed: {}", e);
                LinkError::WifiFailed
            })?;

        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                warn!("WiFi: start failed: {}", e);
                LinkError::WifiFailed
            })?;
        }
        // Non-blocking; completion is observed through `is_up`.
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect request failed: {}", e);
            LinkError::WifiFailed
        })
    }

    fn platform_is_associated(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn platform_disassociate(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            reachable: true,
            associated: false,
            associations: 0,
        }
    }

    /// Simulation: make the AP (un)reachable.  Going unreachable drops an
    /// existing association.
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
        if !reachable {
            self.associated = false;
        }
    }

    pub fn associations(&self) -> u32 {
        self.associations
    }

    fn platform_begin(&mut self, ssid: &str, _password: &str) -> Result<(), LinkError> {
        if self.reachable {
            self.associated = true;
            self.associations += 1;
            info!("WiFi(sim): associated with '{}'", ssid);
        } else {
            warn!("WiFi(sim): '{}' not reachable", ssid);
        }
        Ok(())
    }

    fn platform_is_associated(&self) -> bool {
        self.associated && self.reachable
    }

    fn platform_disassociate(&mut self) {
        self.associated = false;
    }
}

// ───────────────────────────────────────────────────────────────
// WifiPort
// ───────────────────────────────────────────────────────────────

impl WifiPort for WifiAdapter {
    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        info!("WiFi: associating with '{}'", ssid);
        self.platform_begin(ssid, password)
    }

    fn is_associated(&self) -> bool {
        self.platform_is_associated()
    }

    fn disassociate(&mut self) {
        self.platform_disassociate();
        info!("WiFi: disassociated");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
