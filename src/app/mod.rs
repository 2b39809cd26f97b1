//! Application core: station logic with no direct I/O.
//!
//! Readings pass through the change [`filter`], tips and status messages
//! join them in the [`outbox`], and the [`link`] carries them to the
//! broker.  All interaction with hardware and the network happens through
//! the traits in [`ports`], so this layer is fully testable on the host.

pub mod filter;
pub mod lifecycle;
pub mod link;
pub mod message;
pub mod outbox;
pub mod ports;
pub mod reading;
pub mod service;
