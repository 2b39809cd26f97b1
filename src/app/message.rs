//! Outbound messages: station-namespaced topics and JSON payloads.
//!
//! Every message has a fixed-capacity topic and payload so the outbox has
//! a bounded footprint.  Anything that does not fit is refused when it is
//! built, never truncated.
//!
//! | Source        | Topic                                | Payload                                   |
//! |---------------|--------------------------------------|-------------------------------------------|
//! | reading       | `<station>/sensor/<channel>`         | `{"timestamp":"…","value":…}`             |
//! | rain tip      | `<station>/sensor/rain_gauge_tips`   | `{"timestamp":"…"}`                       |
//! | boot          | `<station>/status/boot`              | `{"status":"boot","timestamp":"…","reason":"…"}` |
//! | heartbeat     | `<station>/status/heartbeat`         | `{"status":"ok",…,"uptime":…,"heap_free":…}` |
//! | shutdown      | `<station>/status`                   | `{"status":"shutdown",…,"uptime":…}`      |

use core::fmt::Write as _;

use serde::Serialize;

use super::reading::{Channel, Reading, ReadingValue};
use crate::clock::PreciseTime;
use crate::diagnostics::BootReason;
use crate::error::MessageError;

pub const TOPIC_CAPACITY: usize = 64;
pub const PAYLOAD_CAPACITY: usize = 192;
pub const STATION_ID_CAPACITY: usize = 32;

pub type Topic = heapless::String<TOPIC_CAPACITY>;
pub type Payload = heapless::Vec<u8, PAYLOAD_CAPACITY>;
pub type StationId = heapless::String<STATION_ID_CAPACITY>;

// ── Topics ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Sensor(Channel),
    RainTips,
    Boot,
    Heartbeat,
    Shutdown,
}

/// Topic builder bound to one station id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    station: StationId,
}

impl Topics {
    pub fn new(station_id: &str) -> Result<Self, MessageError> {
        if !is_valid_station_id(station_id) {
            return Err(MessageError::InvalidStationId);
        }
        let station = StationId::try_from(station_id).map_err(|()| MessageError::InvalidStationId)?;
        Ok(Self { station })
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn topic(&self, kind: TopicKind) -> Result<Topic, MessageError> {
        let mut topic = Topic::new();
        let written = match kind {
            TopicKind::Sensor(channel) => write!(topic, "{}/sensor/{}", self.station, channel.topic_name()),
            TopicKind::RainTips => write!(topic, "{}/sensor/rain_gauge_tips", self.station),
            TopicKind::Boot => write!(topic, "{}/status/boot", self.station),
            TopicKind::Heartbeat => write!(topic, "{}/status/heartbeat", self.station),
            TopicKind::Shutdown => write!(topic, "{}/status", self.station),
        };
        written.map_err(|_| MessageError::TopicTooLong)?;
        Ok(topic)
    }
}

/// Non-empty printable ASCII, at most 32 bytes, no MQTT level separator or
/// wildcards.
pub fn is_valid_station_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= STATION_ID_CAPACITY
        && id.bytes().all(|b| (0x21..=0x7E).contains(&b) && !matches!(b, b'/' | b'+' | b'#'))
}

// ── Payload bodies ────────────────────────────────────────────

#[derive(Serialize)]
struct ValueBody {
    timestamp: PreciseTime,
    value: ReadingValue,
}

#[derive(Serialize)]
struct TipBody {
    timestamp: PreciseTime,
}

/// Station status, tagged by `"status"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusReport {
    Boot {
        timestamp: PreciseTime,
        reason: BootReason,
    },
    /// Heartbeat.
    Ok {
        timestamp: PreciseTime,
        uptime: u64,
        heap_free: u32,
        queued: u16,
        dropped_tips: u32,
        dropped_messages: u32,
    },
    Shutdown {
        timestamp: PreciseTime,
        uptime: u64,
    },
}

impl StatusReport {
    pub const fn topic_kind(&self) -> TopicKind {
        match self {
            Self::Boot { .. } => TopicKind::Boot,
            Self::Ok { .. } => TopicKind::Heartbeat,
            Self::Shutdown { .. } => TopicKind::Shutdown,
        }
    }

    pub const fn timestamp(&self) -> PreciseTime {
        match self {
            Self::Boot { timestamp, .. } | Self::Ok { timestamp, .. } | Self::Shutdown { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

// ── Message ───────────────────────────────────────────────────

/// A (topic, payload) pair awaiting publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: Topic,
    pub payload: Payload,
    pub enqueued_at: PreciseTime,
    /// The sample behind a sensor message, so a lost message can be
    /// traced back to its channel.
    pub reading: Option<Reading>,
}

impl Message {
    /// Encode `body` as JSON into a bounded payload.
    pub fn encode(topic: Topic, body: &impl Serialize, enqueued_at: PreciseTime) -> Result<Self, MessageError> {
        let bytes = serde_json::to_vec(body).map_err(|_| MessageError::Encode)?;
        let payload = Payload::from_slice(&bytes).map_err(|()| MessageError::PayloadTooLarge(bytes.len()))?;
        Ok(Self {
            topic,
            payload,
            enqueued_at,
            reading: None,
        })
    }

    pub fn reading(topics: &Topics, reading: &Reading) -> Result<Self, MessageError> {
        let body = ValueBody {
            timestamp: reading.timestamp,
            value: reading.value,
        };
        let message = Self::encode(topics.topic(TopicKind::Sensor(reading.channel))?, &body, reading.timestamp)?;
        Ok(Self {
            reading: Some(*reading),
            ..message
        })
    }

    /// Channel this message reports, if it is a sensor reading.
    pub fn channel(&self) -> Option<Channel> {
        self.reading.map(|r| r.channel)
    }

    pub fn rain_tip(topics: &Topics, at: PreciseTime) -> Result<Self, MessageError> {
        Self::encode(topics.topic(TopicKind::RainTips)?, &TipBody { timestamp: at }, at)
    }

    pub fn status(topics: &Topics, report: &StatusReport) -> Result<Self, MessageError> {
        Self::encode(topics.topic(report.topic_kind())?, report, report.timestamp())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
