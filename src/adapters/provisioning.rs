//! `.env`-style provisioning adapter.
//!
//! Implements [`ConfigPort`] over `KEY=value` text.  On device the text is
//! the `station.env` file compiled into the image; tests hand in literals.
//! Parsing and range checks live in [`SystemConfig::from_env_str`].

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

/// Provisioning text baked into the firmware image.
pub const STATION_ENV: &str = include_str!("../../station.env");

pub struct EnvConfigSource {
    text: &'static str,
}

impl EnvConfigSource {
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    /// The image's compiled-in `station.env`.
    pub const fn builtin() -> Self {
        Self::new(STATION_ENV)
    }
}

impl ConfigPort for EnvConfigSource {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let has_entries = self
            .text
            .lines()
            .map(str::trim)
            .any(|l| !l.is_empty() && !l.starts_with('#'));
        if !has_entries {
            info!("Provisioning: no entries, nothing to load");
            return Err(ConfigError::NotFound);
        }
        SystemConfig::from_env_str(self.text)
            .inspect(|c| info!("Provisioning: loaded config for station '{}'", c.station_id))
            .inspect_err(|e| warn!("Provisioning: rejected ({})", e))
    }
}
