//! Station lifecycle: boot status, heartbeats, shutdown.
//!
//! ```text
//!   BootPending ──on_connected──▶ SteadyState ──begin_shutdown──▶ ShuttingDown
//!        └───────────────────── begin_shutdown ─────────────────────▲
//! ```
//!
//! The boot status goes out once, at the head of the outbox, on the first
//! successful connect.  Heartbeats are wall-clock paced, so a slow or
//! stalled loop never produces a burst of them.

use log::{info, warn};

use super::message::{Message, StatusReport, Topics};
use super::outbox::{Admission, Outbox};
use crate::clock::PreciseTime;
use crate::diagnostics::{BootReason, StationMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    BootPending,
    SteadyState,
    /// Terminal.
    ShuttingDown,
}

pub struct Lifecycle {
    state: LifecycleState,
    boot_reason: BootReason,
    heartbeat_interval_secs: u64,
    last_heartbeat: PreciseTime,
    heartbeats: u32,
}

impl Lifecycle {
    pub fn new(boot_reason: BootReason, heartbeat_interval_secs: u32, created_at: PreciseTime) -> Self {
        Self {
            state: LifecycleState::BootPending,
            boot_reason,
            heartbeat_interval_secs: u64::from(heartbeat_interval_secs.max(1)),
            last_heartbeat: created_at,
            heartbeats: 0,
        }
    }

    /// Queue the boot status ahead of everything else, once.  Returns the
    /// entry evicted to make room, if any.
    pub fn on_connected<const N: usize>(
        &mut self,
        now: PreciseTime,
        topics: &Topics,
        outbox: &mut Outbox<N>,
    ) -> Option<Message> {
        if self.state != LifecycleState::BootPending {
            return None;
        }
        self.state = LifecycleState::SteadyState;
        let report = StatusReport::Boot {
            timestamp: now,
            reason: self.boot_reason,
        };
        match Message::status(topics, &report) {
            Ok(message) => {
                info!("Lifecycle: boot status queued (reason={})", self.boot_reason);
                outbox.enqueue_front(message)
            }
            Err(e) => {
                outbox.record_rejected();
                warn!("Lifecycle: boot status not built: {}", e);
                None
            }
        }
    }

    /// Offer a heartbeat to the outbox if the interval has elapsed since the
    /// last one (or since creation).  `None` when none was due or it could
    /// not be built.
    pub fn poll_heartbeat<const N: usize>(
        &mut self,
        now: PreciseTime,
        metrics: &StationMetrics,
        topics: &Topics,
        outbox: &mut Outbox<N>,
    ) -> Option<Admission> {
        if self.state != LifecycleState::SteadyState {
            return None;
        }
        let elapsed = now.unix_secs().saturating_sub(self.last_heartbeat.unix_secs());
        if elapsed < self.heartbeat_interval_secs {
            return None;
        }
        self.last_heartbeat = now;

        let report = StatusReport::Ok {
            timestamp: now,
            uptime: metrics.uptime_secs,
            heap_free: metrics.heap_free,
            queued: metrics.queued,
            dropped_tips: metrics.dropped_tips,
            dropped_messages: metrics.dropped_messages,
        };
        match Message::status(topics, &report) {
            Ok(message) => {
                let admission = outbox.enqueue(message);
                if admission.is_queued() {
                    self.heartbeats = self.heartbeats.saturating_add(1);
                    info!("Lifecycle: heartbeat #{} queued ({})", self.heartbeats, metrics);
                } else {
                    warn!("Lifecycle: heartbeat refused by full outbox ({})", metrics);
                }
                Some(admission)
            }
            Err(e) => {
                outbox.record_rejected();
                warn!("Lifecycle: heartbeat not built: {}", e);
                None
            }
        }
    }

    /// Enter the terminal state and hand back the shutdown status for a
    /// direct, unqueued publish.  `None` if already shutting down.
    pub fn begin_shutdown(&mut self, now: PreciseTime, uptime_secs: u64, topics: &Topics) -> Option<Message> {
        if self.state == LifecycleState::ShuttingDown {
            return None;
        }
        self.state = LifecycleState::ShuttingDown;
        let report = StatusReport::Shutdown {
            timestamp: now,
            uptime: uptime_secs,
        };
        Message::status(topics, &report)
            .inspect_err(|e| warn!("Lifecycle: shutdown status not built: {}", e))
            .ok()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn heartbeats(&self) -> u32 {
        self.heartbeats
    }
}
