//! MQTT session adapter.
//!
//! Implements [`MqttSession`] over the ESP-IDF MQTT client.  Each
//! `connect` builds a fresh client and waits for the broker's CONNACK;
//! `disconnect` drops it.  Publishes are QoS 0: success means the message
//! was handed to the connected client.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: a logging simulation with a broker
//!   reachability knob.

use core::fmt::Write as _;

use log::{info, warn};

use crate::app::ports::MqttSession;
use crate::config::SystemConfig;
use crate::error::LinkError;

/// How long `connect` waits for the broker to accept the session.
pub const CONNECT_TIMEOUT_MS: u32 = 5_000;

#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 100;

/// Broker address and client credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// `mqtt://host:port`, empty when no broker is provisioned.
    pub url: heapless::String<80>,
    pub client_id: heapless::String<32>,
    pub username: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl MqttSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut url = heapless::String::new();
        if !config.broker_host.is_empty() {
            // 7 + 64 + 1 + 5 bytes always fits.
            let _ = write!(url, "mqtt://{}:{}", config.broker_host, config.broker_port);
        }
        Self {
            url,
            client_id: heapless::String::try_from(config.client_id()).unwrap_or_default(),
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
        }
    }
}

#[cfg(any(target_os = "espidf", test))]
fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttAdapter {
    settings: MqttSettings,
    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
    /// Set from the client's event callback.
    #[cfg(target_os = "espidf")]
    connected: std::sync::Arc<core::sync::atomic::AtomicBool>,
    /// Simulation: whether the broker answers.
    #[cfg(not(target_os = "espidf"))]
    reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    connected: bool,
    #[cfg(not(target_os = "espidf"))]
    published: u32,
}

impl MqttAdapter {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            connected: std::sync::Arc::new(core::sync::atomic::AtomicBool::new(false)),
            #[cfg(not(target_os = "espidf"))]
            reachable: true,
            #[cfg(not(target_os = "espidf"))]
            connected: false,
            #[cfg(not(target_os = "espidf"))]
            published: 0,
        }
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        use core::sync::atomic::Ordering;
        use esp_idf_svc::hal::delay::FreeRtos;
        use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};

        self.client = None;
        self.connected.store(false, Ordering::Release);

        let conf = MqttClientConfiguration {
            client_id: non_empty(&self.settings.client_id),
            username: non_empty(&self.settings.username),
            password: non_empty(&self.settings.password),
            ..Default::default()
        };
        let flag = self.connected.clone();
        let client = EspMqttClient::new_cb(&self.settings.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => flag.store(true, Ordering::Release),
            EventPayload::Disconnected => flag.store(false, Ordering::Release),
            EventPayload::Error(e) => warn!("MQTT: client error: {:?}", e),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            LinkError::MqttConnectFailed
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while waited < CONNECT_TIMEOUT_MS {
            if self.connected.load(Ordering::Acquire) {
                return Ok(());
            }
            FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        self.client = None;
        Err(LinkError::MqttConnectFailed)
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        use core::sync::atomic::Ordering;
        use esp_idf_svc::mqtt::client::QoS;

        if !self.connected.load(Ordering::Acquire) {
            return Err(LinkError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(LinkError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to {} failed: {}", topic, e);
                LinkError::PublishFailed
            })
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client stops its task and closes the socket.
        self.client = None;
        self.connected
            .store(false, core::sync::atomic::Ordering::Release);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        if !self.reachable {
            warn!("MQTT(sim): {} not reachable", self.settings.url);
            return Err(LinkError::MqttConnectFailed);
        }
        self.connected = true;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if !self.reachable {
            self.connected = false;
            return Err(LinkError::PublishFailed);
        }
        self.published += 1;
        info!(
            "MQTT(sim): {} <- {}",
            topic,
            core::str::from_utf8(payload).unwrap_or("<binary>")
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.connected = false;
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// Simulation: make the broker (un)reachable.
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    pub fn published(&self) -> u32 {
        self.published
    }
}

// ───────────────────────────────────────────────────────────────
// MqttSession
// ───────────────────────────────────────────────────────────────

impl MqttSession for MqttAdapter {
    fn connect(&mut self) -> Result<(), LinkError> {
        if self.settings.url.is_empty() {
            return Err(LinkError::NoBroker);
        }
        info!("MQTT: connecting to {} as '{}'", self.settings.url, self.settings.client_id);
        self.platform_connect()?;
        info!("MQTT: session established");
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        self.platform_publish(topic, payload)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
    }
}
