//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `hardware`     | SensorPort         | ESP32 ADC, die sensor, GPIO  |
//! |                | IndicatorPort      | Status LED                   |
//! |                | SystemPort         | System timer, heap stats     |
//! | `mqtt`         | MqttSession        | ESP-IDF MQTT client          |
//! | `provisioning` | ConfigPort         | Compiled-in `station.env`    |
//! | `time`         | TickSource         | ESP32 system timer           |
//! |                | TimeSource         | SNTP-set wall clock          |
//! | `wifi`         | WifiPort           | ESP-IDF WiFi STA             |
//!
//! `device_id` derives the fallback station ID from the factory MAC.

pub mod device_id;
pub mod hardware;
pub mod mqtt;
pub mod provisioning;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
