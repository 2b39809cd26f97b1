//! Change filter: only significant readings reach the outbox.
//!
//! Policy, evaluated in order:
//!
//! 1. nothing reported yet on the channel → publish;
//! 2. threshold given and both values numeric → publish iff
//!    `|current - prior| >= threshold`;
//! 3. otherwise → publish iff the value changed.
//!
//! The prior is the last value that made it into the outbox, so slow drift
//! accumulates until it crosses the threshold.  [`ChangeFilter::evaluate`]
//! only decides; the caller [`commit`](ChangeFilter::commit)s once the
//! message is queued and [`rewind`](ChangeFilter::rewind)s when a queued
//! reading is lost before delivery.

use log::{debug, warn};

use super::reading::{Channel, ReadingValue};
use crate::config::SystemConfig;

/// Outcome of [`ChangeFilter::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub publish: bool,
    /// Cached value before this evaluation.
    pub prior: Option<ReadingValue>,
}

/// Per-channel change thresholds.  `None` means equality comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds([Option<f32>; Channel::COUNT]);

impl Thresholds {
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut table = [None; Channel::COUNT];
        table[Channel::OnboardTemperature.index()] = Some(config.onboard_temperature_threshold);
        table[Channel::Temperature.index()] = Some(config.temperature_threshold);
        Self(table)
    }

    pub fn for_channel(&self, channel: Channel) -> Option<f32> {
        self.0[channel.index()]
    }
}

#[derive(Debug, Default)]
pub struct ChangeFilter {
    prior: [Option<ReadingValue>; Channel::COUNT],
    malformed: u32,
}

impl ChangeFilter {
    pub const fn new() -> Self {
        Self {
            prior: [None; Channel::COUNT],
            malformed: 0,
        }
    }

    /// Decide whether `current` is worth publishing.  Never fails: malformed
    /// input is counted and suppressed.  The cache is not touched.
    pub fn evaluate(&mut self, channel: Channel, current: ReadingValue, threshold: Option<f32>) -> Decision {
        let slot = channel.index();
        let prior = self.prior[slot];

        if !current.is_well_formed() || current.kind() != channel.kind() {
            self.malformed = self.malformed.saturating_add(1);
            warn!("Filter: skipping malformed {:?} reading ({})", channel, current);
            return Decision { publish: false, prior };
        }

        let publish = match (prior, current, threshold) {
            (None, _, _) => true,
            (Some(ReadingValue::Number(p)), ReadingValue::Number(c), Some(t)) => (c - p).abs() >= t,
            (Some(p), c, _) => p != c,
        };

        if !publish {
            debug!("Filter: {:?} {} within threshold of last report", channel, current);
        }
        Decision { publish, prior }
    }

    /// Record `value` as reported on `channel`.
    pub fn commit(&mut self, channel: Channel, value: ReadingValue) {
        self.prior[channel.index()] = Some(value);
    }

    /// Reset `channel` to the newest value still on its way to the broker.
    /// `None` makes the next reading publish unconditionally.
    pub fn rewind(&mut self, channel: Channel, pending: Option<ReadingValue>) {
        let slot = channel.index();
        if self.prior[slot] != pending {
            debug!("Filter: {:?} rewound to {:?}", channel, pending);
            self.prior[slot] = pending;
        }
    }

    /// Last reported value on `channel`.
    pub fn prior(&self, channel: Channel) -> Option<ReadingValue> {
        self.prior[channel.index()]
    }

    /// Readings rejected as malformed since boot.
    pub fn malformed(&self) -> u32 {
        self.malformed
    }
}
