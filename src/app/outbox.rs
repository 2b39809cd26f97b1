//! Store-and-forward outbox.
//!
//! A bounded FIFO of [`Message`]s awaiting publish.  Entries leave only
//! when a publish succeeds; everything else stays in order for the next
//! flush.  When the outbox is at capacity the [`OverflowPolicy`] decides
//! which message is lost, and the loss is counted.

use heapless::Deque;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::ports::Publisher;

/// Compile-time ceiling on outbox depth.  The runtime capacity comes from
/// config and is clamped to `1..=OUTBOX_MAX_DEPTH`.
pub const OUTBOX_MAX_DEPTH: usize = 48;

/// Which message is lost when enqueueing into a full outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the head to make room for the new message.
    #[default]
    DropOldest,
    /// Refuse the new message.
    DropNewest,
}

impl OverflowPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "drop_oldest" => Some(Self::DropOldest),
            "drop_newest" => Some(Self::DropNewest),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropOldest => "drop_oldest",
            Self::DropNewest => "drop_newest",
        }
    }
}

/// Outcome of [`Outbox::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Queued,
    /// Queued after evicting the head.
    Evicted(Message),
    /// Refused; the outbox is unchanged.
    Refused(Message),
}

impl Admission {
    /// The new message is in the outbox.
    pub fn is_queued(&self) -> bool {
        !matches!(self, Self::Refused(_))
    }

    /// The message lost to the overflow policy, if any.
    pub fn into_lost(self) -> Option<Message> {
        match self {
            Self::Queued => None,
            Self::Evicted(message) | Self::Refused(message) => Some(message),
        }
    }
}

/// Result of one [`Outbox::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    /// The flush stopped on a failed publish.
    pub failed: bool,
}

/// Lifetime counters.  All saturate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub enqueued: u32,
    /// Evicted or refused by the overflow policy.
    pub dropped: u32,
    /// Never built because they did not fit their bounds.
    pub rejected: u32,
    pub sent: u32,
    pub publish_failures: u32,
}

pub struct Outbox<const N: usize = OUTBOX_MAX_DEPTH> {
    queue: Deque<Message, N>,
    capacity: usize,
    policy: OverflowPolicy,
    stats: OutboxStats,
}

impl<const N: usize> Outbox<N> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let clamped = capacity.clamp(1, N);
        if clamped != capacity {
            warn!("Outbox: capacity {} clamped to {}", capacity, clamped);
        }
        Self {
            queue: Deque::new(),
            capacity: clamped,
            policy,
            stats: OutboxStats::default(),
        }
    }

    /// Append at the tail, applying the overflow policy when full.
    pub fn enqueue(&mut self, message: Message) -> Admission {
        if !self.is_full() {
            self.push_back(message);
            return Admission::Queued;
        }
        self.count_drop();
        match self.policy {
            OverflowPolicy::DropNewest => {
                warn!("Outbox: full, refusing {}", message.topic());
                Admission::Refused(message)
            }
            OverflowPolicy::DropOldest => match self.queue.pop_front() {
                Some(evicted) => {
                    warn!("Outbox: full, evicted {}", evicted.topic());
                    self.push_back(message);
                    Admission::Evicted(evicted)
                }
                None => {
                    self.push_back(message);
                    Admission::Queued
                }
            },
        }
    }

    /// Insert at the head.  Only the boot status goes here.  When full, the
    /// newest entry makes room regardless of policy.
    pub fn enqueue_front(&mut self, message: Message) -> Option<Message> {
        let lost = if self.is_full() {
            self.count_drop();
            self.queue.pop_back()
        } else {
            None
        };
        if let Some(evicted) = &lost {
            warn!("Outbox: full, evicted {} for {}", evicted.topic(), message.topic());
        }
        if self.queue.push_front(message).is_ok() {
            self.stats.enqueued = self.stats.enqueued.saturating_add(1);
        }
        lost
    }

    /// Publish queued messages head-first, up to the count present at the
    /// call.  Stops at the first failure and leaves that entry at the head.
    pub fn flush(&mut self, publisher: &mut impl Publisher) -> FlushReport {
        let snapshot = self.queue.len();
        let mut report = FlushReport::default();

        for _ in 0..snapshot {
            let Some(head) = self.queue.front() else {
                break;
            };
            match publisher.publish(head.topic(), head.payload()) {
                Ok(()) => {
                    debug!("Outbox: sent {}", head.topic());
                    self.queue.pop_front();
                    report.sent += 1;
                    self.stats.sent = self.stats.sent.saturating_add(1);
                }
                Err(e) => {
                    warn!("Outbox: publish of {} failed: {} ({} left)", head.topic(), e, self.queue.len());
                    report.failed = true;
                    self.stats.publish_failures = self.stats.publish_failures.saturating_add(1);
                    break;
                }
            }
        }
        report
    }

    /// Count a message that could not be built.
    pub fn record_rejected(&mut self) {
        self.stats.rejected = self.stats.rejected.saturating_add(1);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Queued messages, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.queue.iter()
    }

    pub fn stats(&self) -> OutboxStats {
        self.stats
    }

    fn push_back(&mut self, message: Message) {
        if self.queue.push_back(message).is_ok() {
            self.stats.enqueued = self.stats.enqueued.saturating_add(1);
        }
    }

    fn count_drop(&mut self) {
        self.stats.dropped = self.stats.dropped.saturating_add(1);
    }
}
