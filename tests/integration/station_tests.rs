//! Integration tests for the StationService cycle: sensors and tips in,
//! store-and-forward through outages, boot/heartbeat/shutdown status out.
//!
//! These run on the host (x86_64) against the mocks in `mock_hw`.

use crate::mock_hw::{MockBroker, MockDelay, MockSensors, MockTime, MockWifi};

use raingauge::app::lifecycle::LifecycleState;
use raingauge::app::outbox::OverflowPolicy;
use raingauge::app::ports::SystemPort;
use raingauge::app::reading::{Channel, ReadingValue};
use raingauge::app::service::StationService;
use raingauge::config::SystemConfig;
use raingauge::diagnostics::BootReason;
use raingauge::error::{Error, MessageError};
use raingauge::events::{TipBuffer, TipConsumer, TIP_BUFFER_CAPACITY};

const BOOT: &str = "station/status/boot";
const HEARTBEAT: &str = "station/status/heartbeat";
const STATUS: &str = "station/status";
const ONBOARD: &str = "station/sensor/onboard_temperature";
const TEMPERATURE: &str = "station/sensor/temperature";
const CHARGE: &str = "station/sensor/charge_state";
const TIPS: &str = "station/sensor/rain_gauge_tips";

type Station<'a> = StationService<'a, &'a MockTime, MockWifi, MockBroker>;

fn config() -> SystemConfig {
    let mut c = SystemConfig::default();
    c.station_id = heapless::String::try_from("station").unwrap();
    c.wifi_ssid = heapless::String::try_from("FieldAP").unwrap();
    c.wifi_password = heapless::String::try_from("mysecret8").unwrap();
    c.broker_host = heapless::String::try_from("broker").unwrap();
    c.wifi_attempts = 2;
    c.mqtt_attempts = 2;
    c
}

fn station<'a>(
    cfg: &SystemConfig,
    time: &'a MockTime,
    tips: TipConsumer<'a, TIP_BUFFER_CAPACITY>,
) -> Station<'a> {
    StationService::new(cfg, time, tips, MockWifi::new(), MockBroker::new(), BootReason::PowerOn).unwrap()
}

fn broker<'s>(station: &'s Station<'_>) -> &'s MockBroker {
    station.link().session()
}

fn set_wifi(station: &mut Station<'_>, reachable: bool) {
    station.link_mut().wifi_mut().reachable = reachable;
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_status_precedes_first_readings() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();

    let report = station.cycle(&mut hw, &mut MockDelay::default());

    assert!(report.connected);
    assert_eq!(report.readings, 3);
    assert_eq!(report.flush.map(|f| f.sent), Some(4));
    assert_eq!(broker(&station).topics(), vec![BOOT, ONBOARD, TEMPERATURE, CHARGE]);

    let (_, boot) = &broker(&station).published[0];
    assert!(boot.contains(r#""status":"boot""#), "{boot}");
    assert!(boot.contains(r#""reason":"power_on""#), "{boot}");
    assert_eq!(
        broker(&station).published[2].1,
        r#"{"timestamp":"1700000000.000","value":70.5}"#
    );
    assert_eq!(
        broker(&station).published[3].1,
        r#"{"timestamp":"1700000000.000","value":false}"#
    );
    assert_eq!(hw.led_toggles, 1);
    assert_eq!(station.lifecycle_state(), LifecycleState::SteadyState);
}

#[test]
fn invalid_station_id_is_rejected() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut cfg = config();
    cfg.station_id = heapless::String::try_from("bad/id").unwrap();

    let result = StationService::new(&cfg, &time, consumer, MockWifi::new(), MockBroker::new(), BootReason::PowerOn);
    assert!(matches!(result, Err(Error::Message(MessageError::InvalidStationId))));
}

// ── Change filter ─────────────────────────────────────────────

#[test]
fn only_significant_changes_are_published() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();
    station.cycle(&mut hw, &mut delay);

    // Unchanged.
    time.advance_secs(5);
    assert_eq!(station.cycle(&mut hw, &mut delay).readings, 0);

    // Within the 0.25 probe threshold.
    hw.set(Channel::Temperature, ReadingValue::Number(70.6));
    time.advance_secs(5);
    assert_eq!(station.cycle(&mut hw, &mut delay).readings, 0);

    // Drift since the last report crosses it.
    hw.set(Channel::Temperature, ReadingValue::Number(70.8));
    hw.set(Channel::ChargeState, ReadingValue::Flag(true));
    time.advance_secs(5);
    assert_eq!(station.cycle(&mut hw, &mut delay).readings, 2);

    let topics = broker(&station).topics();
    assert_eq!(&topics[4..], &[TEMPERATURE, CHARGE]);
}

#[test]
fn failed_sensor_is_skipped_for_the_cycle() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();
    hw.fail(Channel::Temperature);

    let report = station.cycle(&mut hw, &mut MockDelay::default());
    assert_eq!(report.readings, 2);
    assert_eq!(broker(&station).topics(), vec![BOOT, ONBOARD, CHARGE]);
}

// ── Store-and-forward ─────────────────────────────────────────

#[test]
fn tips_recorded_offline_are_delivered_after_reconnect() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (mut tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();

    set_wifi(&mut station, false);
    let report = station.cycle(&mut hw, &mut delay);
    assert!(!report.connected);
    assert_eq!(report.flush, None);
    assert_eq!(report.queued, 3);
    // Two association checks, one second apart.
    assert_eq!(delay.total_ms, 2_000);

    time.advance_ms(1_500);
    assert!(tips.on_tip());
    let report = station.cycle(&mut hw, &mut delay);
    assert_eq!(report.tips, 1);
    assert_eq!(report.queued, 4);
    assert_eq!(station.offline_cycles(), 2);
    assert!(broker(&station).published.is_empty());

    set_wifi(&mut station, true);
    let report = station.cycle(&mut hw, &mut delay);
    assert!(report.connected);
    assert_eq!(report.queued, 0);
    assert_eq!(station.offline_cycles(), 0);
    assert_eq!(broker(&station).topics(), vec![BOOT, ONBOARD, TEMPERATURE, CHARGE, TIPS]);
    assert_eq!(broker(&station).published[4].1, r#"{"timestamp":"1700000001.500"}"#);
}

#[test]
fn publish_failure_keeps_the_backlog_in_order() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();
    station.cycle(&mut hw, &mut delay);

    hw.set(Channel::OnboardTemperature, ReadingValue::Number(97.0));
    hw.set(Channel::Temperature, ReadingValue::Number(72.0));
    hw.set(Channel::ChargeState, ReadingValue::Flag(true));
    station.link_mut().session_mut().fail_publishes = 1;
    time.advance_secs(5);

    let report = station.cycle(&mut hw, &mut delay);
    assert_eq!(report.readings, 3);
    let flush = report.flush.unwrap();
    assert!(flush.failed);
    assert_eq!(flush.sent, 0);
    assert_eq!(report.queued, 3);
    assert!(!broker(&station).connected);
    assert_eq!(station.metrics(&hw).publish_failures, 1);

    time.advance_secs(5);
    let report = station.cycle(&mut hw, &mut delay);
    assert_eq!(report.flush.map(|f| f.sent), Some(3));
    assert_eq!(broker(&station).connects, 2);
    let topics = broker(&station).topics();
    assert_eq!(&topics[4..], &[ONBOARD, TEMPERATURE, CHARGE]);
    assert_eq!(topics.iter().filter(|t| **t == BOOT).count(), 1);
}

#[test]
fn full_outbox_drops_the_oldest() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut cfg = config();
    cfg.outbox_capacity = 4;
    let mut station = station(&cfg, &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();

    set_wifi(&mut station, false);
    station.cycle(&mut hw, &mut delay);
    hw.set(Channel::OnboardTemperature, ReadingValue::Number(99.0));
    hw.set(Channel::Temperature, ReadingValue::Number(75.0));
    hw.set(Channel::ChargeState, ReadingValue::Flag(true));
    time.advance_secs(5);
    let report = station.cycle(&mut hw, &mut delay);

    assert_eq!(report.queued, 4);
    assert_eq!(station.outbox().stats().dropped, 2);
    assert_eq!(station.metrics(&hw).dropped_messages, 2);

    // The boot status takes the head; the newest entry makes room.
    set_wifi(&mut station, true);
    time.advance_secs(5);
    station.cycle(&mut hw, &mut delay);
    assert_eq!(broker(&station).topics(), vec![BOOT, CHARGE, ONBOARD, TEMPERATURE]);
    assert!(broker(&station).published[1].1.ends_with(r#""value":false}"#));
    assert!(broker(&station).published[3].1.ends_with(r#""value":75.0}"#));

    // The evicted `true` never reached the broker, so it goes out again.
    time.advance_secs(5);
    let report = station.cycle(&mut hw, &mut delay);
    assert_eq!(report.readings, 1);
    let (topic, payload) = broker(&station).published.last().unwrap();
    assert_eq!(topic, CHARGE);
    assert!(payload.ends_with(r#""value":true}"#), "{payload}");
}

#[test]
fn refused_reading_is_offered_again() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut cfg = config();
    cfg.outbox_capacity = 3;
    cfg.overflow_policy = OverflowPolicy::DropNewest;
    let mut station = station(&cfg, &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();

    set_wifi(&mut station, false);
    assert_eq!(station.cycle(&mut hw, &mut delay).queued, 3);

    // The outbox is full: the new charge state is refused, then the boot
    // status evicts the queued `false`.
    hw.set(Channel::ChargeState, ReadingValue::Flag(true));
    set_wifi(&mut station, true);
    time.advance_secs(5);
    let report = station.cycle(&mut hw, &mut delay);
    assert_eq!(report.readings, 0);
    assert_eq!(station.outbox().stats().dropped, 2);
    assert_eq!(broker(&station).topics(), vec![BOOT, ONBOARD, TEMPERATURE]);

    for _ in 0..3 {
        time.advance_secs(5);
        station.cycle(&mut hw, &mut delay);
    }
    let charge: Vec<&str> = broker(&station)
        .published
        .iter()
        .filter(|(t, _)| t == CHARGE)
        .map(|(_, p)| p.as_str())
        .collect();
    assert_eq!(charge.len(), 1);
    assert!(charge[0].ends_with(r#""value":true}"#), "{}", charge[0]);
}

#[test]
fn refused_heartbeat_is_not_reported() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut cfg = config();
    cfg.outbox_capacity = 3;
    cfg.overflow_policy = OverflowPolicy::DropNewest;
    let mut station = station(&cfg, &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();
    station.cycle(&mut hw, &mut delay);

    // Broker goes away with three changed readings queued.
    station.link_mut().session_mut().up = false;
    station.link_mut().session_mut().fail_publishes = 1;
    hw.set(Channel::OnboardTemperature, ReadingValue::Number(99.0));
    hw.set(Channel::Temperature, ReadingValue::Number(75.0));
    hw.set(Channel::ChargeState, ReadingValue::Flag(true));
    time.advance_secs(5);
    assert_eq!(station.cycle(&mut hw, &mut delay).queued, 3);

    time.advance_secs(300);
    let report = station.cycle(&mut hw, &mut delay);
    assert!(!report.heartbeat);
    assert_eq!(report.queued, 3);
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_follows_the_interval() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();
    station.cycle(&mut hw, &mut delay);

    time.advance_secs(299);
    assert!(!station.cycle(&mut hw, &mut delay).heartbeat);

    time.advance_secs(1);
    hw.uptime = 300;
    let report = station.cycle(&mut hw, &mut delay);
    assert!(report.heartbeat);

    let (topic, payload) = broker(&station).published.last().unwrap();
    assert_eq!(topic, HEARTBEAT);
    assert!(payload.contains(r#""status":"ok""#), "{payload}");
    assert!(payload.contains(r#""uptime":300"#), "{payload}");
    assert!(payload.contains(r#""heap_free":200000"#), "{payload}");
}

#[test]
fn no_heartbeat_before_first_connection() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();

    set_wifi(&mut station, false);
    station.cycle(&mut hw, &mut delay);
    time.advance_secs(600);
    assert!(!station.cycle(&mut hw, &mut delay).heartbeat);
    assert_eq!(station.lifecycle_state(), LifecycleState::BootPending);
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_sends_status_and_stops_the_loop() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();
    station.cycle(&mut hw, &mut delay);

    hw.uptime = 42;
    assert!(station.shutdown(&hw, &mut delay));
    assert_eq!(hw.uptime_secs(), 42);

    let (topic, payload) = broker(&station).published.last().unwrap();
    assert_eq!(topic, STATUS);
    assert!(payload.contains(r#""status":"shutdown""#), "{payload}");
    assert!(payload.contains(r#""uptime":42"#), "{payload}");
    assert!(!broker(&station).connected);
    assert_eq!(station.lifecycle_state(), LifecycleState::ShuttingDown);

    let sent = broker(&station).published.len();
    hw.set(Channel::Temperature, ReadingValue::Number(80.0));
    let report = station.cycle(&mut hw, &mut delay);
    assert!(!report.connected);
    assert_eq!(report.readings, 0);
    assert_eq!(broker(&station).published.len(), sent);
    assert!(!station.shutdown(&hw, &mut delay));
}

#[test]
fn shutdown_after_offline_guard_reconnects_once() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut cfg = config();
    cfg.reboot_after_offline_cycles = 3;
    let mut station = station(&cfg, &time, consumer);
    let mut hw = MockSensors::new();
    let mut delay = MockDelay::default();
    station.cycle(&mut hw, &mut delay);

    // A publish failure drops the session and the broker stays away.
    hw.set(Channel::Temperature, ReadingValue::Number(72.0));
    station.link_mut().session_mut().fail_publishes = 1;
    station.link_mut().session_mut().up = false;

    // Same exit condition as the device loop.
    loop {
        time.advance_secs(5);
        station.cycle(&mut hw, &mut delay);
        if station.offline_cycles() >= cfg.reboot_after_offline_cycles {
            break;
        }
    }
    assert_eq!(station.offline_cycles(), 3);
    assert!(!station.link().is_connected());

    station.link_mut().session_mut().up = true;
    hw.uptime = 20;
    assert!(station.shutdown(&hw, &mut delay));

    let (topic, payload) = broker(&station).published.last().unwrap();
    assert_eq!(topic, STATUS);
    assert!(payload.contains(r#""status":"shutdown""#), "{payload}");
    assert!(!broker(&station).connected);
    assert_eq!(station.lifecycle_state(), LifecycleState::ShuttingDown);
}

#[test]
fn shutdown_while_offline_sends_nothing() {
    let time = MockTime::new();
    let mut buffer = TipBuffer::<TIP_BUFFER_CAPACITY>::new();
    let (_tips, consumer) = buffer.split(&time);
    let mut station = station(&config(), &time, consumer);
    let mut hw = MockSensors::new();

    set_wifi(&mut station, false);
    station.cycle(&mut hw, &mut MockDelay::default());
    // One connect pass: two association checks, then give up.
    let mut delay = MockDelay::default();
    assert!(!station.shutdown(&hw, &mut delay));
    assert_eq!(delay.total_ms, 2_000);
    assert!(broker(&station).published.is_empty());
}
