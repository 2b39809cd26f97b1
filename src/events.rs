//! Interrupt-driven rain-gauge tip capture.
//!
//! Each falling edge on the gauge's reed switch is one tip.  The GPIO ISR
//! records the raw millisecond tick; the main loop drains the buffer once
//! per cycle and resolves ticks to [`PreciseTime`] against the clock anchor.
//!
//! ```text
//! ┌─────────────┐  on_tip()   ┌──────────────┐  drain()    ┌──────────────┐
//! │ GPIO ISR    │────────────▶│  TipBuffer   │────────────▶│  Main Loop   │
//! │ (producer)  │  raw tick   │  (lock-free) │  resolved   │  (consumer)  │
//! └─────────────┘             └──────────────┘             └──────────────┘
//! ```
//!
//! The ring is a `heapless::spsc::Queue` split into disjoint halves: the
//! producer only appends at the tail, the consumer only removes from the
//! head.  A full ring drops the new tip and bumps an atomic counter.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};

use crate::clock::{PreciseClock, PreciseTime, TickSource, TimeSource};

/// Ring size for the device build.  Holds `TIP_BUFFER_CAPACITY - 1` tips,
/// several minutes of the heaviest recorded downpour at a 5 s cycle.
pub const TIP_BUFFER_CAPACITY: usize = 32;

/// Reed-switch bounce window applied on device.
pub const TIP_DEBOUNCE_MS: u32 = 50;

// ── Buffer ────────────────────────────────────────────────────

/// Backing storage for the tip queue.  Split once into its two halves.
pub struct TipBuffer<const N: usize> {
    queue: Queue<u32, N>,
    dropped: AtomicU32,
}

impl<const N: usize> Default for TipBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TipBuffer<N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Hand out the ISR-side producer and the loop-side consumer.
    pub fn split<C: TickSource>(&mut self, ticks: C) -> (TipProducer<'_, C, N>, TipConsumer<'_, N>) {
        let (producer, consumer) = self.queue.split();
        (
            TipProducer {
                queue: producer,
                ticks,
                dropped: &self.dropped,
                debounce_ms: 0,
                last_tick: None,
            },
            TipConsumer {
                queue: consumer,
                dropped: &self.dropped,
            },
        )
    }
}

// ── Producer (ISR side) ───────────────────────────────────────

pub struct TipProducer<'a, C, const N: usize> {
    queue: Producer<'a, u32, N>,
    ticks: C,
    dropped: &'a AtomicU32,
    debounce_ms: u32,
    last_tick: Option<u32>,
}

impl<C: TickSource, const N: usize> TipProducer<'_, C, N> {
    /// Ignore edges closer than `ms` to the previous accepted tip.
    #[must_use]
    pub fn with_debounce(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Record one tip.  Bounded time, no allocation, never blocks.
    ///
    /// Returns `false` when the tip was not stored (bounce or full ring).
    pub fn on_tip(&mut self) -> bool {
        let tick = self.ticks.ticks_ms();
        if let Some(last) = self.last_tick {
            if tick.wrapping_sub(last) < self.debounce_ms {
                return false;
            }
        }
        self.last_tick = Some(tick);

        if self.queue.enqueue(tick).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }
}

// ── Consumer (main-loop side) ─────────────────────────────────

pub struct TipConsumer<'a, const N: usize> {
    queue: Consumer<'a, u32, N>,
    dropped: &'a AtomicU32,
}

impl<const N: usize> TipConsumer<'_, N> {
    /// Remove every tip buffered at call time, oldest first.
    ///
    /// Tips the ISR adds while draining are left for the next call.
    pub fn drain<S: TimeSource>(&mut self, clock: &mut PreciseClock<S>) -> heapless::Vec<PreciseTime, N> {
        let mut out = heapless::Vec::new();
        for _ in 0..self.queue.len() {
            let Some(tick) = self.queue.dequeue() else { break };
            // The ring never holds more than N - 1 entries.
            let _ = out.push(clock.resolve(tick));
        }
        out
    }

    /// Tips waiting to be drained.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Tips lost to a full ring since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Usable ring slots (`N - 1`).
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
