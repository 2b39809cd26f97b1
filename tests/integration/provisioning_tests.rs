//! Integration tests for `.env` provisioning into a running station:
//! credentials, broker address, station identity and tuning all flow from
//! the provisioning text into topics and link behaviour.

use crate::mock_hw::{MockBroker, MockDelay, MockSensors, MockTime, MockWifi};

use raingauge::adapters::device_id;
use raingauge::adapters::mqtt::MqttSettings;
use raingauge::adapters::provisioning::EnvConfigSource;
use raingauge::app::outbox::OverflowPolicy;
use raingauge::app::ports::{ConfigError, ConfigPort};
use raingauge::app::service::StationService;
use raingauge::diagnostics::BootReason;
use raingauge::events::{TipBuffer, TIP_BUFFER_CAPACITY};

const FIELD_ENV: &str = r#"
# north paddock gauge
export STATION_ID=north_paddock
WIFI_SSID="Farm Office"
WIFI_PASSWORD='tractor-2024'
MQTT_BROKER_IP=192.168.4.10
MQTT_BROKER_PORT=1884
MQTT_ATTEMPTS=3
MQTT_RETRY_DELAY_MS=500
MQTT_MAX_BACKOFF_MS=1000
OUTBOX_CAPACITY=16
OUTBOX_OVERFLOW=drop_newest
"#;

#[test]
fn provisioned_station_publishes_under_its_id() {
    let cfg = EnvConfigSource::new(FIELD_ENV).load().unwrap();
    assert_eq!(cfg.outbox_capacity, 16);
    assert_eq!(cfg.overflow_policy, OverflowPolicy::DropNewest);
    assert_eq!(
        MqttSettings::from_config(&cfg).url.as_str(),
        "mqtt://192.168.4.10:1884"
    );

    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station =
        StationService::new(&cfg, &time, consumer, MockWifi::new(), MockBroker::new(), BootReason::SoftwareReset)
            .unwrap();
    let mut hw = MockSensors::new();
    station.cycle(&mut hw, &mut MockDelay::default());

    let published = &station.link().session().published;
    assert_eq!(published[0].0, "north_paddock/status/boot");
    assert!(published[0].1.contains(r#""reason":"software_reset""#), "{}", published[0].1);
    assert_eq!(station.outbox().capacity(), 16);
}

#[test]
fn provisioned_backoff_is_applied() {
    let cfg = EnvConfigSource::new(FIELD_ENV).load().unwrap();
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station =
        StationService::new(&cfg, &time, consumer, MockWifi::new(), MockBroker::new(), BootReason::PowerOn)
            .unwrap();
    station.link_mut().session_mut().up = false;

    let mut delay = MockDelay::default();
    let report = station.cycle(&mut MockSensors::new(), &mut delay);
    assert!(!report.connected);
    // Three attempts: 500 ms, then 1000 ms (capped), none after the last.
    assert_eq!(delay.total_ms, 1_500);
    assert_eq!(station.metrics(&MockSensors::new()).connect_failures, 1);
}

#[test]
fn empty_station_id_falls_back_to_mac() {
    let mut cfg = EnvConfigSource::new("STATION_ID=\nWIFI_SSID=FieldAP\n").load().unwrap();
    assert!(cfg.station_id.is_empty());
    cfg.station_id = device_id::station_id(&device_id::read_mac());

    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let station =
        StationService::new(&cfg, &time, consumer, MockWifi::new(), MockBroker::new(), BootReason::PowerOn)
            .unwrap();
    assert_eq!(station.topics().station(), "rg-efcafe");
}

#[test]
fn bad_provisioning_is_reported() {
    assert_eq!(EnvConfigSource::new("").load(), Err(ConfigError::NotFound));
    assert!(matches!(
        EnvConfigSource::new("OUTBOX_CAPACITY=500\n").load(),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert!(matches!(
        EnvConfigSource::new("WIFI_SSID FieldAP\n").load(),
        Err(ConfigError::ValidationFailed(_))
    ));
}
