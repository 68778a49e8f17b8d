//! Defines all configuration structures for the crate.
//!
//! These structs are deserialized with `serde`, so a host's timer behaviour
//! can be set from a TOML file or from `ASPECT_`-prefixed environment
//! variables (e.g. `ASPECT_TIMERS__MIN_DELAY_MS=4`).

use crate::error::Result;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use tokio::time::MissedTickBehavior;

/// The top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AspectConfig {
    /// Settings for `TimerHost` instances built from this config.
    #[serde(default)]
    pub timers: TimerConfig,
}

/// Tuning knobs for a `TimerHost`.
#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    /// Lower bound applied to every requested delay, in milliseconds.
    #[serde(default)]
    pub min_delay_ms: u64,

    /// Capacity of the `TimerEvent` broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// What an interval does when it falls behind.
    #[serde(default)]
    pub missed_tick: MissedTick,
}

/// Mirrors tokio's `MissedTickBehavior` in a deserializable form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissedTick {
    /// Fire the missed ticks back to back.
    #[default]
    Burst,
    /// Restart the period from the late tick.
    Delay,
    /// Drop missed ticks and wait for the next aligned one.
    Skip,
}

impl From<MissedTick> for MissedTickBehavior {
    fn from(value: MissedTick) -> Self {
        match value {
            MissedTick::Burst => MissedTickBehavior::Burst,
            MissedTick::Delay => MissedTickBehavior::Delay,
            MissedTick::Skip => MissedTickBehavior::Skip,
        }
    }
}

impl AspectConfig {
    /// Loads the configuration from an optional TOML file, then applies
    /// `ASPECT_` environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("ASPECT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parses a TOML document without consulting the environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

// --- Default value functions for serde ---

fn default_event_capacity() -> usize {
    64
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            event_capacity: default_event_capacity(),
            missed_tick: MissedTick::default(),
        }
    }
}
