//! Property and fuzz-style tests for robustness of core data structures.
//!
//! Runs on host (x86_64) only; proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use std::cell::Cell;

use proptest::prelude::*;
use raingauge::app::filter::ChangeFilter;
use raingauge::app::message::{is_valid_station_id, Message, TopicKind, Topics, TOPIC_CAPACITY};
use raingauge::app::outbox::{Outbox, OverflowPolicy};
use raingauge::app::ports::Publisher;
use raingauge::app::reading::{Channel, ReadingValue};
use raingauge::clock::{PreciseClock, PreciseTime, TickSource, TimeSource};
use raingauge::config::SystemConfig;
use raingauge::error::LinkError;
use raingauge::events::TipBuffer;

// ── Outbox bounds and ordering ────────────────────────────────

#[derive(Debug, Clone)]
enum OutboxOp {
    Enqueue,
    /// Flush where the n-th publish fails (`None` = broker healthy).
    Flush(Option<usize>),
}

fn arb_outbox_op() -> impl Strategy<Value = OutboxOp> {
    prop_oneof![
        4 => Just(OutboxOp::Enqueue),
        1 => proptest::option::of(0usize..4).prop_map(OutboxOp::Flush),
    ]
}

struct Recorder {
    fail_at: Option<usize>,
    calls: usize,
    sent: Vec<Vec<u8>>,
}

impl Publisher for Recorder {
    fn publish(&mut self, _topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            return Err(LinkError::PublishFailed);
        }
        self.sent.push(payload.to_vec());
        Ok(())
    }
}

proptest! {
    /// Depth never exceeds capacity, every message is accounted for as
    /// queued, sent or dropped, and delivery order matches enqueue order.
    #[test]
    fn outbox_accounting_and_order(
        capacity in 1usize..=8,
        drop_oldest in any::<bool>(),
        ops in proptest::collection::vec(arb_outbox_op(), 1..=60),
    ) {
        let policy = if drop_oldest { OverflowPolicy::DropOldest } else { OverflowPolicy::DropNewest };
        let topics = Topics::new("prop").unwrap();
        let mut outbox: Outbox = Outbox::new(capacity, policy);
        let mut delivered: Vec<Vec<u8>> = Vec::new();
        let mut enqueued = 0u64;

        for op in &ops {
            match op {
                OutboxOp::Enqueue => {
                    let message = Message::rain_tip(&topics, PreciseTime::from_unix_ms(enqueued)).unwrap();
                    let _ = outbox.enqueue(message);
                    enqueued += 1;
                }
                OutboxOp::Flush(fail_at) => {
                    let mut publisher = Recorder { fail_at: *fail_at, calls: 0, sent: Vec::new() };
                    let report = outbox.flush(&mut publisher);
                    prop_assert_eq!(report.sent, publisher.sent.len());
                    delivered.extend(publisher.sent);
                }
            }
            prop_assert!(outbox.len() <= capacity);
        }

        let stats = outbox.stats();
        prop_assert_eq!(
            enqueued,
            outbox.len() as u64 + delivered.len() as u64 + u64::from(stats.dropped)
        );

        // Timestamps were enqueued in increasing order; delivery preserves it.
        let stamp = |p: &[u8]| -> u64 {
            let s = std::str::from_utf8(p).unwrap();
            s.trim_start_matches("{\"timestamp\":\"")
                .trim_end_matches("\"}")
                .replace('.', "")
                .parse()
                .unwrap()
        };
        let ordered = delivered.windows(2).all(|w| stamp(&w[0]) < stamp(&w[1]));
        prop_assert!(ordered, "delivery out of enqueue order");
    }
}

// ── Change filter ─────────────────────────────────────────────

proptest! {
    /// Consecutive published values are always at least a threshold apart,
    /// and the first value is always published.
    #[test]
    fn filter_respects_threshold(
        threshold in 0.0f32..5.0,
        values in proptest::collection::vec(-40.0f32..120.0, 1..=50),
    ) {
        let mut filter = ChangeFilter::new();
        let mut published: Vec<f32> = Vec::new();
        for v in &values {
            let value = ReadingValue::Number(*v);
            if filter.evaluate(Channel::Temperature, value, Some(threshold)).publish {
                filter.commit(Channel::Temperature, value);
                published.push(*v);
            }
        }
        prop_assert_eq!(published.first().copied(), Some(values[0]));
        prop_assert!(published.windows(2).all(|w| (w[1] - w[0]).abs() >= threshold));
    }

    /// Flags publish exactly on change.
    #[test]
    fn flag_publishes_on_every_change(flags in proptest::collection::vec(any::<bool>(), 1..=50)) {
        let mut filter = ChangeFilter::new();
        let mut last: Option<bool> = None;
        for f in &flags {
            let value = ReadingValue::Flag(*f);
            let decision = filter.evaluate(Channel::ChargeState, value, None);
            prop_assert_eq!(decision.publish, last != Some(*f));
            if decision.publish {
                filter.commit(Channel::ChargeState, value);
            }
            last = Some(*f);
        }
    }
}

// ── Clock monotonicity ────────────────────────────────────────

struct Source {
    secs: Cell<u64>,
    ticks: Cell<u32>,
}

impl TickSource for Source {
    fn ticks_ms(&self) -> u32 {
        self.ticks.get()
    }
}

impl TimeSource for Source {
    fn unix_secs(&self) -> u64 {
        self.secs.get()
    }
}

proptest! {
    /// Arbitrary tick advances (including wrap) and forward wall-clock
    /// corrections never move `now_precise` backwards.
    #[test]
    fn precise_time_never_goes_backwards(
        start_tick in any::<u32>(),
        steps in proptest::collection::vec((0u32..5_000, 0u64..3), 1..=100),
    ) {
        let src = Source { secs: Cell::new(1_700_000_000), ticks: Cell::new(start_tick) };
        let mut clock = PreciseClock::new(&src);
        let mut last = clock.now_precise();
        for (advance_ms, jump_secs) in &steps {
            src.ticks.set(src.ticks.get().wrapping_add(*advance_ms));
            src.secs.set(src.secs.get() + u64::from(*advance_ms) / 1000 + jump_secs);
            let now = clock.now_precise();
            prop_assert!(now >= last, "{} < {}", now, last);
            last = now;
        }
    }
}

// ── Tip buffer ────────────────────────────────────────────────

proptest! {
    /// Every edge is either drained or counted as dropped, and the drained
    /// tips are exactly the stored ones, in capture order.
    #[test]
    fn tips_are_drained_or_counted(
        bursts in proptest::collection::vec((0usize..12, 1u32..200), 1..=20),
    ) {
        let src = Source { secs: Cell::new(1_700_000_000), ticks: Cell::new(0) };
        let mut clock = PreciseClock::new(&src);
        let mut buffer = TipBuffer::<8>::new();
        let (mut producer, mut consumer) = buffer.split(&src);

        let mut edges = 0u32;
        let mut stored: Vec<u32> = Vec::new();
        let mut drained: Vec<PreciseTime> = Vec::new();
        for (count, gap_ms) in &bursts {
            for _ in 0..*count {
                src.ticks.set(src.ticks.get() + gap_ms);
                if producer.on_tip() {
                    stored.push(src.ticks.get());
                }
                edges += 1;
            }
            src.secs.set(1_700_000_000 + u64::from(src.ticks.get()) / 1000);
            drained.extend(consumer.drain(&mut clock));
        }

        prop_assert_eq!(edges, stored.len() as u32 + consumer.dropped());
        prop_assert_eq!(drained.len(), stored.len());
        // One anchor serves every resolve, so spacing between drained tips
        // mirrors the captured ticks one for one.
        if let (Some(first_tip), Some(first_tick)) = (drained.first(), stored.first()) {
            for (tip, tick) in drained.iter().zip(&stored) {
                prop_assert_eq!(
                    tip.as_unix_ms() - first_tip.as_unix_ms(),
                    u64::from(tick - first_tick)
                );
            }
        }
    }
}

// ── Provisioning parser ───────────────────────────────────────

proptest! {
    /// Arbitrary text never panics the parser, and anything it accepts
    /// passes validation.
    #[test]
    fn env_parser_never_panics(text in "\\PC{0,200}") {
        if let Ok(config) = SystemConfig::from_env_str(&text) {
            prop_assert!(config.validate().is_ok());
        }
    }

    /// Every valid station id yields topics within capacity that start
    /// with the id.
    #[test]
    fn valid_station_ids_make_valid_topics(id in "[!-~]{1,32}") {
        prop_assume!(is_valid_station_id(&id));
        let topics = Topics::new(&id).unwrap();
        for kind in [
            TopicKind::Sensor(Channel::OnboardTemperature),
            TopicKind::RainTips,
            TopicKind::Boot,
            TopicKind::Heartbeat,
            TopicKind::Shutdown,
        ] {
            let topic = topics.topic(kind).unwrap();
            prop_assert!(topic.len() <= TOPIC_CAPACITY);
            prop_assert!(topic.starts_with(id.as_str()));
        }
    }
}
