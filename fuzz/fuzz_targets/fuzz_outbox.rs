//! Fuzz target: `Outbox` enqueue / flush interleavings
//!
//! Each input byte is one operation: low bit set = flush (upper bits pick
//! which publish fails, if any), clear = enqueue.
//!
//! Invariants checked:
//! - Depth never exceeds the configured capacity
//! - Every enqueued message is queued, sent or counted as dropped
//!
//! cargo fuzz run fuzz_outbox

#![no_main]

use libfuzzer_sys::fuzz_target;
use raingauge::app::message::{Message, Topics};
use raingauge::app::outbox::{Outbox, OverflowPolicy};
use raingauge::app::ports::Publisher;
use raingauge::clock::PreciseTime;
use raingauge::error::LinkError;

struct Flaky {
    fail_at: Option<usize>,
    calls: usize,
}

impl Publisher for Flaky {
    fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<(), LinkError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            Err(LinkError::PublishFailed)
        } else {
            Ok(())
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&header, ops)) = data.split_first() else {
        return;
    };
    let capacity = usize::from(header & 0x3F).max(1);
    let policy = if header & 0x80 == 0 {
        OverflowPolicy::DropOldest
    } else {
        OverflowPolicy::DropNewest
    };
    let topics = Topics::new("fuzz").unwrap();
    let mut outbox: Outbox = Outbox::new(capacity, policy);
    let mut enqueued = 0u64;
    let mut sent = 0u64;

    for &op in ops {
        if op & 1 == 0 {
            let message = Message::rain_tip(&topics, PreciseTime::from_unix_ms(enqueued)).unwrap();
            let _ = outbox.enqueue(message);
            enqueued += 1;
        } else {
            let fail_at = (op & 0x80 != 0).then_some(usize::from((op >> 1) & 0x0F));
            let report = outbox.flush(&mut Flaky { fail_at, calls: 0 });
            sent += report.sent as u64;
        }
        assert!(outbox.len() <= outbox.capacity());
    }
    assert_eq!(
        enqueued,
        outbox.len() as u64 + sent + u64::from(outbox.stats().dropped)
    );
});
