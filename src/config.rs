use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::set::Tick;

/// Default output window width, in ticks.
pub const DEFAULT_WINDOW_TIME: Tick = 625_000;
/// Default extra lag before a window is considered closed, in ticks.
pub const DEFAULT_BUFFER_TIME: Tick = 0;
/// Default bound on blocking channel operations.
pub const DEFAULT_QUEUE_TIMEOUT_MS: u64 = 100;
/// Default heartbeat cadence, in ticks.
pub const DEFAULT_HEARTBEAT_INTERVAL: Tick = 5_000;
/// Default tick frequency (62.5 MHz readout clock).
pub const DEFAULT_CLOCK_FREQUENCY_HZ: u64 = 62_500_000;
/// Default pause between producer emissions.
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 1_000;

/// Errors surfaced while ingesting a configuration blob.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration blob is not valid for this stage: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("failed to read primitive file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed primitive row {line} in {path}")]
    MalformedRow { path: String, line: usize },
}

/// Stage configuration stashed by `configure` and ingested at `start`.
///
/// Deserialized from the opaque command blob; unknown keys are ignored and
/// every known key has a default so an empty object is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default = "default_window_time")]
    pub window_time: Tick,
    #[serde(default = "default_buffer_time")]
    pub buffer_time: Tick,
    #[serde(default)]
    pub source_id: u32,
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
    #[serde(default = "default_drop_on_drain")]
    pub drop_on_drain: bool,
    /// Algorithm-specific sub-object, passed verbatim to the factory.
    #[serde(default)]
    pub algorithm: Value,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            window_time: DEFAULT_WINDOW_TIME,
            buffer_time: DEFAULT_BUFFER_TIME,
            source_id: 0,
            queue_timeout_ms: DEFAULT_QUEUE_TIMEOUT_MS,
            drop_on_drain: true,
            algorithm: Value::Null,
        }
    }
}

impl StageConfig {
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

/// Heartbeat injector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: Tick,
    #[serde(default = "default_clock_frequency_hz")]
    pub clock_frequency_hz: u64,
    #[serde(default)]
    pub heartbeat_send_offset_ms: u64,
    #[serde(default)]
    pub source_id: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            clock_frequency_hz: DEFAULT_CLOCK_FREQUENCY_HZ,
            heartbeat_send_offset_ms: 0,
            source_id: 0,
        }
    }
}

impl HeartbeatConfig {
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Wall-clock pause between consecutive heartbeats.
    pub fn send_interval(&self) -> Duration {
        let freq = self.clock_frequency_hz.max(1);
        Duration::from_nanos(self.heartbeat_interval.saturating_mul(1_000_000_000) / freq)
    }

    /// Emission lag expressed in ticks.
    pub fn send_offset_ticks(&self) -> Tick {
        self.heartbeat_send_offset_ms
            .saturating_mul(self.clock_frequency_hz)
            / 1_000
    }
}

/// File-driven test producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub filename: String,
    #[serde(default = "default_number_of_loops")]
    pub number_of_loops: u64,
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
    #[serde(default)]
    pub source_id: u32,
}

impl ProducerConfig {
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

fn default_window_time() -> Tick {
    DEFAULT_WINDOW_TIME
}

fn default_buffer_time() -> Tick {
    DEFAULT_BUFFER_TIME
}

fn default_queue_timeout_ms() -> u64 {
    DEFAULT_QUEUE_TIMEOUT_MS
}

fn default_drop_on_drain() -> bool {
    true
}

fn default_heartbeat_interval() -> Tick {
    DEFAULT_HEARTBEAT_INTERVAL
}

fn default_clock_frequency_hz() -> u64 {
    DEFAULT_CLOCK_FREQUENCY_HZ
}

fn default_number_of_loops() -> u64 {
    1
}

fn default_send_interval_ms() -> u64 {
    DEFAULT_SEND_INTERVAL_MS
}
