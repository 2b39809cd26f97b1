//! Millisecond-precision wall-clock timestamps.
//!
//! The chip's wall clock only resolves whole seconds, so timestamps are
//! derived from an anchor (wall-clock milliseconds paired with a reading of
//! the free-running millisecond tick) plus the tick delta since then:
//!
//! ```text
//!   unix_ms = anchor.unix_ms + (tick - anchor.tick)      (wrapping u32)
//! ```
//!
//! The anchor is taken at first use, refreshed from the derived time once a
//! day, and replaced whenever the wall clock and the derived time disagree
//! by [`RESYNC_TOLERANCE_MS`] or more (SNTP sync, manual set).  Values handed
//! out by [`PreciseClock::now_precise`] never go backwards.
//!
//! Interrupt handlers never touch the clock.  They record a raw tick via
//! [`TickSource`] and the main loop turns it into a [`PreciseTime`] with
//! [`PreciseClock::resolve`].

use core::fmt::{self, Write as _};

use log::{debug, info};
use serde::{Serialize, Serializer};

/// Wall-clock divergence that forces a re-anchor.
pub const RESYNC_TOLERANCE_MS: u64 = 2_000;

/// Tick span after which the anchor is rolled forward (one day).
const REANCHOR_INTERVAL_MS: u32 = 86_400_000;

// ───────────────────────────────────────────────────────────────
// PreciseTime
// ───────────────────────────────────────────────────────────────

/// Unix seconds plus milliseconds (0–999).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PreciseTime {
    unix_secs: u64,
    millis: u16,
}

impl PreciseTime {
    /// Build from seconds and milliseconds; millis ≥ 1000 carry into seconds.
    pub const fn new(unix_secs: u64, millis: u16) -> Self {
        Self {
            unix_secs: unix_secs.saturating_add((millis / 1000) as u64),
            millis: millis % 1000,
        }
    }

    pub const fn from_unix_ms(unix_ms: u64) -> Self {
        Self {
            unix_secs: unix_ms / 1000,
            millis: (unix_ms % 1000) as u16,
        }
    }

    pub const fn unix_secs(self) -> u64 {
        self.unix_secs
    }

    pub const fn millis(self) -> u16 {
        self.millis
    }

    pub const fn as_unix_ms(self) -> u64 {
        self.unix_secs.saturating_mul(1000).saturating_add(self.millis as u64)
    }
}

/// Wire form: `<unix_secs>.<mmm>`.
impl fmt::Display for PreciseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.unix_secs, self.millis)
    }
}

impl Serialize for PreciseTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // u64::MAX is 20 digits, plus '.' and three millis digits.
        let mut buf = heapless::String::<24>::new();
        write!(buf, "{self}")
            .map_err(|_| <S::Error as serde::ser::Error>::custom("timestamp overflow"))?;
        serializer.serialize_str(&buf)
    }
}

/// Human-readable UTC rendering, `YYYY-MM-DD HH:MM:SS.mmm`.
///
/// Falls back to the wire form for instants the calendar cannot represent.
pub fn format(t: PreciseTime) -> heapless::String<32> {
    let mut out = heapless::String::new();
    let date_time = i64::try_from(t.unix_secs)
        .ok()
        .and_then(|secs| time::OffsetDateTime::from_unix_timestamp(secs).ok());
    let _ = match date_time {
        Some(dt) => write!(
            out,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            dt.year(),
            u8::from(dt.month()),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            t.millis
        ),
        None => write!(out, "{t}"),
    };
    out
}

// ───────────────────────────────────────────────────────────────
// Time sources
// ───────────────────────────────────────────────────────────────

/// Free-running millisecond counter.  Must be safe to read from an ISR.
pub trait TickSource {
    /// Milliseconds since an arbitrary origin; wraps at `u32::MAX`.
    fn ticks_ms(&self) -> u32;
}

/// Tick counter plus the wall clock.
pub trait TimeSource: TickSource {
    /// Whole seconds since the Unix epoch.
    fn unix_secs(&self) -> u64;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn ticks_ms(&self) -> u32 {
        (**self).ticks_ms()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn unix_secs(&self) -> u64 {
        (**self).unix_secs()
    }
}

// ───────────────────────────────────────────────────────────────
// PreciseClock
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Anchor {
    unix_ms: u64,
    tick: u32,
}

impl Anchor {
    fn project(self, tick: u32) -> u64 {
        self.unix_ms.saturating_add(u64::from(tick.wrapping_sub(self.tick)))
    }
}

/// Main-loop clock combining wall-clock seconds with the millisecond tick.
pub struct PreciseClock<S> {
    source: S,
    anchor: Option<Anchor>,
    last_ms: u64,
}

impl<S: TimeSource> PreciseClock<S> {
    pub const fn new(source: S) -> Self {
        Self {
            source,
            anchor: None,
            last_ms: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current time; never lower than any value previously returned.
    pub fn now_precise(&mut self) -> PreciseTime {
        let tick = self.source.ticks_ms();
        let wall_ms = self.source.unix_secs().saturating_mul(1000);
        let anchor = self.refresh_anchor(tick, wall_ms);

        let ms = anchor.project(tick).max(self.last_ms);
        self.last_ms = ms;
        PreciseTime::from_unix_ms(ms)
    }

    /// Convert a tick captured elsewhere (typically in an ISR) to precise time.
    ///
    /// Ticks up to ~24 days either side of the anchor resolve correctly.
    /// Resolution does not advance the monotonic floor of `now_precise`.
    pub fn resolve(&mut self, tick: u32) -> PreciseTime {
        let anchor = match self.anchor {
            Some(anchor) => anchor,
            None => {
                let _ = self.now_precise();
                match self.anchor {
                    Some(anchor) => anchor,
                    None => return PreciseTime::from_unix_ms(self.last_ms),
                }
            }
        };
        let delta = i64::from(tick.wrapping_sub(anchor.tick) as i32);
        PreciseTime::from_unix_ms(anchor.unix_ms.saturating_add_signed(delta))
    }

    fn refresh_anchor(&mut self, tick: u32, wall_ms: u64) -> Anchor {
        let Some(anchor) = self.anchor else {
            debug!("Clock: anchored at {} ms (tick {})", wall_ms, tick);
            return self.set_anchor(wall_ms, tick);
        };

        let derived = anchor.project(tick);
        if derived.abs_diff(wall_ms) >= RESYNC_TOLERANCE_MS {
            info!(
                "Clock: wall clock moved {} ms away from derived time, re-anchoring",
                derived.abs_diff(wall_ms)
            );
            return self.set_anchor(wall_ms, tick);
        }

        if tick.wrapping_sub(anchor.tick) >= REANCHOR_INTERVAL_MS {
            debug!("Clock: rolling anchor forward to {} ms", derived);
            return self.set_anchor(derived, tick);
        }

        anchor
    }

    fn set_anchor(&mut self, unix_ms: u64, tick: u32) -> Anchor {
        let anchor = Anchor { unix_ms, tick };
        self.anchor = Some(anchor);
        anchor
    }
}
