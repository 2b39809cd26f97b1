//! Rain gauge station firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod pins;

// Hardware-facing modules; device implementations are cfg-gated inside
// with simulation backends for host builds.
pub mod adapters;
pub mod drivers;
pub mod sensors;
