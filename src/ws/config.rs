#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

const DEFAULT_URL: &str = "ws://localhost:8181";
const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_HEARTBEAT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_RECONNECT_INTERVAL_DURATION: Duration = Duration::from_secs(2);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_RECONNECT_DECAY: f64 = 1.5;
const DEFAULT_MAX_QUEUED_MESSAGES: usize = 1024;

/// Hard ceiling on the reconnect delay, regardless of attempt count.
pub const RECONNECT_DELAY_CEILING: Duration = Duration::from_secs(30);

/// Configuration for WebSocket client behavior.
///
/// Replacing any field through [`ConfigUpdate`] takes effect on the next
/// connect attempt, never mid-flight.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    /// Target WebSocket endpoint
    pub url: String,
    /// Interval between liveness probes while connected.
    /// A zero interval disables heartbeats entirely.
    pub heartbeat_interval: Duration,
    /// Maximum time to wait for a pong reply before forcing the socket closed
    pub heartbeat_timeout: Duration,
    /// Base delay for the first reconnect attempt
    pub reconnect_interval: Duration,
    /// Number of reconnect attempts before the manager gives up
    pub max_reconnect_attempts: u32,
    /// Multiplier applied to the reconnect delay per attempt; must be > 1.0
    pub reconnect_decay: f64,
    /// Bound on the outbound queue; the oldest payload is evicted on overflow
    pub max_queued_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_DURATION,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT_DURATION,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL_DURATION,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_decay: DEFAULT_RECONNECT_DECAY,
            max_queued_messages: DEFAULT_MAX_QUEUED_MESSAGES,
        }
    }
}

impl Config {
    /// Merge a partial update into this config.
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(url) = update.url {
            self.url = url;
        }
        if let Some(interval) = update.heartbeat_interval {
            self.heartbeat_interval = interval;
        }
        if let Some(timeout) = update.heartbeat_timeout {
            self.heartbeat_timeout = timeout;
        }
        if let Some(interval) = update.reconnect_interval {
            self.reconnect_interval = interval;
        }
        if let Some(max) = update.max_reconnect_attempts {
            self.max_reconnect_attempts = max;
        }
        if let Some(decay) = update.reconnect_decay {
            self.reconnect_decay = decay;
        }
        if let Some(max) = update.max_queued_messages {
            self.max_queued_messages = max;
        }
    }
}

/// Partial configuration; each field is independently overridable.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub url: Option<String>,
    pub heartbeat_interval: Option<Duration>,
    pub heartbeat_timeout: Option<Duration>,
    pub reconnect_interval: Option<Duration>,
    pub max_reconnect_attempts: Option<u32>,
    pub reconnect_decay: Option<f64>,
    pub max_queued_messages: Option<usize>,
}

impl From<&Config> for ExponentialBackoff {
    fn from(config: &Config) -> Self {
        // A decay <= 1.0 would stall or shrink the delay sequence.
        let multiplier = if config.reconnect_decay.is_finite() && config.reconnect_decay > 1.0 {
            config.reconnect_decay
        } else {
            DEFAULT_RECONNECT_DECAY
        };

        ExponentialBackoffBuilder::default()
            .with_initial_interval(config.reconnect_interval)
            .with_randomization_factor(0.0) // Deterministic delays, no jitter
            .with_multiplier(multiplier)
            .with_max_interval(RECONNECT_DELAY_CEILING)
            .with_max_elapsed_time(None) // We handle max attempts separately
            .build()
    }
}
