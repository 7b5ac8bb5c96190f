//! Engine and ingestion policy settings.
//!
//! Every field has a default, so an empty TOML table deserialises to the
//! stock policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling and capacity policy of the orchestration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Meetings tracked before inactive ones are evicted
    #[serde(default = "default_max_meetings")]
    pub max_meetings: usize,

    /// Inactivity after which a meeting may be evicted
    #[serde(default = "default_meeting_timeout_ms")]
    pub meeting_timeout_ms: i64,

    /// Minimum spacing between two judgment calls of one meeting
    #[serde(default = "default_global_cooldown_ms")]
    pub global_cooldown_ms: i64,

    /// Queue entries older than this are dropped unexecuted
    #[serde(default = "default_stale_entry_ms")]
    pub stale_entry_ms: i64,

    /// Period of the queue-draining tick
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_max_meetings() -> usize {
    100
}

fn default_meeting_timeout_ms() -> i64 {
    12 * 60 * 60 * 1000
}

fn default_global_cooldown_ms() -> i64 {
    2_000
}

fn default_stale_entry_ms() -> i64 {
    60_000
}

fn default_tick_interval_ms() -> u64 {
    3_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_meetings: default_max_meetings(),
            meeting_timeout_ms: default_meeting_timeout_ms(),
            global_cooldown_ms: default_global_cooldown_ms(),
            stale_entry_ms: default_stale_entry_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl EngineConfig {
    /// Never zero; a configured `0` runs the tick every millisecond.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Polling, cleanup and backoff policy of the ingestion loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum transcript messages fetched per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Long-poll wait per receive call
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    /// Run inactive-meeting cleanup every this many polls
    #[serde(default = "default_cleanup_every_polls")]
    pub cleanup_every_polls: u64,

    /// Consecutive failures tolerated before backing off
    #[serde(default = "default_backoff_after_errors")]
    pub backoff_after_errors: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Pending events buffered per meeting lane
    #[serde(default = "default_lane_capacity")]
    pub lane_capacity: usize,
}

fn default_batch_size() -> usize {
    10
}

fn default_wait_ms() -> u64 {
    20_000
}

fn default_cleanup_every_polls() -> u64 {
    100
}

fn default_backoff_after_errors() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_lane_capacity() -> usize {
    256
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            wait_ms: default_wait_ms(),
            cleanup_every_polls: default_cleanup_every_polls(),
            backoff_after_errors: default_backoff_after_errors(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            lane_capacity: default_lane_capacity(),
        }
    }
}

impl IngestConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Sleep before the next poll after `consecutive_errors` failures in a
    /// row, or `None` while still under the threshold.
    pub fn backoff(&self, consecutive_errors: u32) -> Option<Duration> {
        if consecutive_errors <= self.backoff_after_errors {
            return None;
        }
        let exponent = (consecutive_errors - self.backoff_after_errors).min(16);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms);
        Some(Duration::from_millis(ms))
    }
}
