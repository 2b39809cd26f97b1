//! Rain gauge station firmware: main entry point.
//!
//! Hexagonal architecture with a fixed-interval store-and-forward loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        EnvConfigSource     EspTimeSource      │
//! │  (Sensor+Indicator+     (ConfigPort)        (Tick+TimeSource)  │
//! │   System)               WifiAdapter         MqttAdapter        │
//! │                         (WifiPort)          (MqttSession)      │
//! │  rain gauge ISR ──▶ TipBuffer                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           StationService (pure logic)                  │    │
//! │  │  ChangeFilter · Outbox · Link · Lifecycle              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Watchdog (fed through every delay) · offline reboot guard     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::{anyhow, Result};
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::EspWifi;

use raingauge::adapters::device_id;
use raingauge::adapters::hardware::HardwareAdapter;
use raingauge::adapters::mqtt::{MqttAdapter, MqttSettings};
use raingauge::adapters::provisioning::EnvConfigSource;
use raingauge::adapters::time::EspTimeSource;
use raingauge::adapters::wifi::WifiAdapter;
use raingauge::app::ports::{ConfigError, ConfigPort};
use raingauge::app::service::StationService;
use raingauge::config::SystemConfig;
use raingauge::diagnostics;
use raingauge::drivers::hw_init::{self, RawInputPin};
use raingauge::drivers::rain_gauge;
use raingauge::drivers::status_led::StatusLed;
use raingauge::drivers::watchdog::{Watchdog, WatchdogDelay};
use raingauge::events::{TipBuffer, TIP_BUFFER_CAPACITY, TIP_DEBOUNCE_MS};
use raingauge::pins;
use raingauge::sensors::{self, charge::ChargeStatus, onboard::OnboardSensor, temperature::ProbeSensor};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Rain gauge station v{}           ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();
    let boot_reason = diagnostics::read_boot_reason();
    info!("Boot: {}", boot_reason);

    // ── 2. Provisioning ───────────────────────────────────────
    let mut config = match EnvConfigSource::builtin().load() {
        Ok(cfg) => cfg,
        Err(ConfigError::NotFound) => {
            warn!("No station.env entries, using defaults");
            SystemConfig::default()
        }
        Err(e) => {
            warn!("station.env rejected ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    if config.station_id.is_empty() {
        config.station_id = device_id::station_id(&device_id::read_mac());
        info!("Station ID derived from MAC: {}", config.station_id);
    }

    // ── 3. Hardware peripherals ───────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Peripheral init failure is critical; the watchdog is not armed
        // yet, so restart explicitly.
        error!("HAL init failed: {}, restarting", e);
        restart();
    }
    let onboard = OnboardSensor::new().map_err(|e| anyhow!("{}", e))?;
    let watchdog = Watchdog::new();

    // ── 4. Network stack ──────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    let wifi = WifiAdapter::new(esp_wifi);
    let mqtt = MqttAdapter::new(MqttSettings::from_config(&config));
    // Kept alive for the life of the loop; sets the wall clock once the
    // first association completes.
    let _sntp = EspSntp::new_default()?;

    // ── 5. Rain gauge ISR ─────────────────────────────────────
    let tip_buffer: &'static mut TipBuffer<TIP_BUFFER_CAPACITY> = Box::leak(Box::new(TipBuffer::new()));
    let (producer, consumer) = tip_buffer.split(EspTimeSource::new());
    if let Err(e) = rain_gauge::install(producer.with_debounce(TIP_DEBOUNCE_MS)) {
        error!("Rain gauge ISR install failed: {}, tips will not be recorded", e);
    }

    // ── 6. Adapters + service ─────────────────────────────────
    let sensor_hub = sensors::SensorHub::new(
        onboard,
        ProbeSensor::new(),
        ChargeStatus::new(RawInputPin::new(pins::CHARGE_STATUS_GPIO)),
    );
    let mut hw = HardwareAdapter::new(sensor_hub, StatusLed::new(), EspTimeSource::new());
    let mut delay = WatchdogDelay::new(&watchdog);

    let mut station = StationService::new(&config, EspTimeSource::new(), consumer, wifi, mqtt, boot_reason)
        .map_err(|e| anyhow!("station init failed: {}", e))?;

    info!("System ready. Entering station loop.");

    // ── 7. Station loop ───────────────────────────────────────
    loop {
        let report = station.cycle(&mut hw, &mut delay);
        watchdog.feed();

        if config.reboot_after_offline_cycles > 0
            && station.offline_cycles() >= config.reboot_after_offline_cycles
        {
            warn!(
                "Offline for {} cycles with {} queued, restarting",
                station.offline_cycles(),
                report.queued
            );
            break;
        }

        delay.delay_ms(config.cycle_interval_ms);
    }

    let _ = station.shutdown(&hw, &mut delay);
    restart()
}

fn restart() -> ! {
    info!("Restarting");
    // SAFETY: esp_restart never returns; no invariants to uphold.
    unsafe { esp_idf_svc::sys::esp_restart() }
}
