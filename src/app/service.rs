//! Station service: the hexagonal core.
//!
//! [`StationService`] owns every piece of station state: clock, tip
//! consumer, change filter, outbox, link and lifecycle.  `main` owns the
//! service and drives it with one [`cycle`](StationService::cycle) per
//! interval.  All I/O flows through port traits, so the whole loop runs on
//! the host against mocks.
//!
//! ```text
//!  TipConsumer ──┐
//!                ▼
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ Link ──▶ MqttSession
//!                 │      StationService       │
//! IndicatorPort ◀─│ Filter · Outbox · Lifecycle│
//!                 └──────────────────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::clock::{self, PreciseClock, PreciseTime, TimeSource};
use crate::config::SystemConfig;
use crate::diagnostics::{BootReason, StationMetrics};
use crate::error::Error;
use crate::events::{TIP_BUFFER_CAPACITY, TipConsumer};

use super::filter::{ChangeFilter, Thresholds};
use super::lifecycle::{Lifecycle, LifecycleState};
use super::link::{Link, LinkSettings};
use super::message::{Message, Topics};
use super::outbox::{Admission, FlushReport, Outbox};
use super::ports::{IndicatorPort, MqttSession, Publisher, SensorPort, SystemPort, WifiPort};
use super::reading::{Channel, Reading};

/// What one [`StationService::cycle`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub now: PreciseTime,
    /// Tips that made it into the outbox.
    pub tips: usize,
    /// Readings that passed the change filter and were queued.
    pub readings: usize,
    pub heartbeat: bool,
    pub connected: bool,
    /// `None` when there was no session to flush into.
    pub flush: Option<FlushReport>,
    /// Outbox depth at the end of the cycle.
    pub queued: usize,
}

pub struct StationService<'a, S, W, M> {
    clock: PreciseClock<S>,
    tips: TipConsumer<'a, TIP_BUFFER_CAPACITY>,
    filter: ChangeFilter,
    thresholds: Thresholds,
    outbox: Outbox,
    link: Link<W, M>,
    lifecycle: Lifecycle,
    topics: Topics,
    cycles: u64,
    offline_cycles: u32,
}

impl<'a, S: TimeSource, W: WifiPort, M: MqttSession> StationService<'a, S, W, M> {
    /// Build the service.  Fails only on an unusable station id.
    pub fn new(
        config: &SystemConfig,
        time: S,
        tips: TipConsumer<'a, TIP_BUFFER_CAPACITY>,
        wifi: W,
        mqtt: M,
        boot_reason: BootReason,
    ) -> Result<Self, Error> {
        let topics = Topics::new(&config.station_id)?;
        let mut precise = PreciseClock::new(time);
        let created_at = precise.now_precise();

        info!(
            "StationService: '{}' up at {} (boot={}, outbox={} {})",
            topics.station(),
            clock::format(created_at),
            boot_reason,
            config.outbox_capacity,
            config.overflow_policy.as_str()
        );

        Ok(Self {
            clock: precise,
            tips,
            filter: ChangeFilter::new(),
            thresholds: Thresholds::from_config(config),
            outbox: Outbox::new(usize::from(config.outbox_capacity), config.overflow_policy),
            link: Link::new(wifi, mqtt, LinkSettings::from_config(config)),
            lifecycle: Lifecycle::new(boot_reason, config.heartbeat_interval_secs, created_at),
            topics,
            cycles: 0,
            offline_cycles: 0,
        })
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one cycle: tips → sensors → heartbeat → connect → flush → LED.
    ///
    /// `hw` satisfies every hardware-facing port at once, which avoids
    /// several mutable borrows of the same board.  Does nothing once
    /// shutdown has begun.
    pub fn cycle(
        &mut self,
        hw: &mut (impl SensorPort + IndicatorPort + SystemPort),
        delay: &mut impl DelayNs,
    ) -> CycleReport {
        let now = self.clock.now_precise();
        if self.lifecycle.state() == LifecycleState::ShuttingDown {
            return CycleReport {
                now,
                queued: self.outbox.len(),
                ..CycleReport::default()
            };
        }
        self.cycles = self.cycles.saturating_add(1);

        // 1. Rain tips captured since the last cycle
        let tips = self.drain_tips();

        // 2. Polled sensors through the change filter
        let readings = self.sample(hw, now);

        // 3. Heartbeat
        let metrics = self.metrics(&*hw);
        let heartbeat = match self
            .lifecycle
            .poll_heartbeat(now, &metrics, &self.topics, &mut self.outbox)
        {
            Some(admission) => self.settle(admission),
            None => false,
        };

        // 4. Link, boot status, flush
        let connected = self.link.ensure_connected(delay).is_some();
        let flush = if connected {
            self.offline_cycles = 0;
            if let Some(evicted) = self.lifecycle.on_connected(now, &self.topics, &mut self.outbox) {
                self.forget_lost(&evicted);
            }
            let report = self.outbox.flush(&mut self.link);
            if report.sent > 0 || report.failed {
                debug!("StationService: flushed {} ({} left)", report.sent, self.outbox.len());
            }
            Some(report)
        } else {
            self.offline_cycles = self.offline_cycles.saturating_add(1);
            debug!(
                "StationService: offline for {} cycle(s), {} queued",
                self.offline_cycles,
                self.outbox.len()
            );
            None
        };

        // 5. Liveness
        hw.toggle();

        CycleReport {
            now,
            tips,
            readings,
            heartbeat,
            connected,
            flush,
            queued: self.outbox.len(),
        }
    }

    fn drain_tips(&mut self) -> usize {
        let tips = self.tips.drain(&mut self.clock);
        let mut queued = 0;
        for &at in &tips {
            info!("Rain gauge tip at {}", clock::format(at));
            match Message::rain_tip(&self.topics, at) {
                Ok(message) => {
                    let admission = self.outbox.enqueue(message);
                    if self.settle(admission) {
                        queued += 1;
                    }
                }
                Err(e) => {
                    self.outbox.record_rejected();
                    warn!("StationService: tip message not built: {}", e);
                }
            }
        }
        queued
    }

    fn sample(&mut self, sensors: &mut impl SensorPort, now: PreciseTime) -> usize {
        let mut published = 0;
        for channel in Channel::ALL {
            let value = match sensors.read(channel) {
                Ok(value) => value,
                Err(e) => {
                    warn!("StationService: {:?} read failed: {}", channel, e);
                    continue;
                }
            };
            let decision = self
                .filter
                .evaluate(channel, value, self.thresholds.for_channel(channel));
            if !decision.publish {
                continue;
            }
            let reading = Reading {
                channel,
                value,
                timestamp: now,
            };
            match Message::reading(&self.topics, &reading) {
                Ok(message) => {
                    let admission = self.outbox.enqueue(message);
                    if admission.is_queued() {
                        info!("StationService: {:?} = {}", channel, value);
                        self.filter.commit(channel, value);
                        published += 1;
                    }
                    self.settle(admission);
                }
                Err(e) => {
                    self.outbox.record_rejected();
                    warn!("StationService: {:?} message not built: {}", channel, e);
                }
            }
        }
        published
    }

    /// Reconcile the filter with whatever the outbox lost.  Returns whether
    /// the offered message was queued.
    fn settle(&mut self, admission: Admission) -> bool {
        let queued = admission.is_queued();
        if let Some(lost) = admission.into_lost() {
            self.forget_lost(&lost);
        }
        queued
    }

    /// A reading that will never reach the broker must not hold the filter:
    /// fall back to the newest value still queued on its channel.
    fn forget_lost(&mut self, lost: &Message) {
        let Some(channel) = lost.channel() else {
            return;
        };
        let pending = self
            .outbox
            .iter()
            .filter_map(|m| m.reading)
            .filter(|r| r.channel == channel)
            .last()
            .map(|r| r.value);
        self.filter.rewind(channel, pending);
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Send the shutdown status straight through the session, then tear
    /// the link down.  Without a live session one connect pass is made
    /// within the normal retry budget.  Nothing is queued or retried.
    /// Returns whether the shutdown status was delivered.
    pub fn shutdown(&mut self, sys: &impl SystemPort, delay: &mut impl DelayNs) -> bool {
        if self.lifecycle.state() == LifecycleState::ShuttingDown {
            return false;
        }
        let now = self.clock.now_precise();
        let message = self.lifecycle.begin_shutdown(now, sys.uptime_secs(), &self.topics);

        let delivered = match message {
            Some(message) if self.link.ensure_connected(delay).is_some() => {
                match self.link.publish(message.topic(), message.payload()) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("StationService: shutdown status lost: {}", e);
                        false
                    }
                }
            }
            Some(_) => {
                info!("StationService: offline, shutdown status not sent");
                false
            }
            None => false,
        };

        self.link.teardown();
        info!(
            "StationService: shut down after {} cycle(s), {} message(s) unsent",
            self.cycles,
            self.outbox.len()
        );
        delivered
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn metrics(&self, sys: &impl SystemPort) -> StationMetrics {
        let outbox = self.outbox.stats();
        let link = self.link.stats();
        StationMetrics {
            uptime_secs: sys.uptime_secs(),
            heap_free: sys.free_heap(),
            cycles: self.cycles,
            queued: u16::try_from(self.outbox.len()).unwrap_or(u16::MAX),
            dropped_tips: self.tips.dropped(),
            dropped_messages: outbox.dropped,
            rejected_messages: outbox.rejected,
            malformed_readings: self.filter.malformed(),
            sessions: link.sessions,
            connect_failures: link.connect_failures,
            publish_failures: link.publish_failures,
        }
    }

    /// Consecutive cycles that ended without a session.
    pub fn offline_cycles(&self) -> u32 {
        self.offline_cycles
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn link(&self) -> &Link<W, M> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<W, M> {
        &mut self.link
    }

    pub fn clock(&self) -> &PreciseClock<S> {
        &self.clock
    }
}
