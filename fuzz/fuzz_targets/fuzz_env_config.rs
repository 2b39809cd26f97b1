//! Fuzz target: `SystemConfig::from_env_str` (`.env` provisioning path)
//!
//! Feeds arbitrary UTF-8 text to the provisioning parser.
//!
//! Invariants checked:
//! - No panics under any input
//! - Any accepted config passes `validate()`
//! - Any accepted non-empty station id builds a full topic set
//!
//! cargo fuzz run fuzz_env_config

#![no_main]

use libfuzzer_sys::fuzz_target;
use raingauge::app::message::{TopicKind, Topics};
use raingauge::config::SystemConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = SystemConfig::from_env_str(text) else {
        return;
    };
    assert!(config.validate().is_ok(), "parser accepted an invalid config");

    if config.station_id.is_empty() {
        return;
    }
    let topics = Topics::new(&config.station_id).expect("validated station id must build topics");
    for kind in [TopicKind::RainTips, TopicKind::Boot, TopicKind::Heartbeat, TopicKind::Shutdown] {
        assert!(topics.topic(kind).is_ok());
    }
});
