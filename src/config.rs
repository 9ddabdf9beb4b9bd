//! Connection and dispatch settings for the stream client.
//!
//! Every value has a default matching the exchange's published limits, and
//! [`StreamConfig::from_env`] lets a deployment override them through
//! `BINANCE_*` environment variables.

use crate::error::{BinanceError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const MAINNET_WS_STREAM_URL: &str = "wss://stream.binance.com:9443/stream";
pub const TESTNET_WS_STREAM_URL: &str = "wss://testnet.binance.vision/stream";

const DEFAULT_RECONNECT_MIN: Duration = Duration::from_secs(2);
const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(30);
const DEFAULT_RECONNECT_FACTOR: f64 = 1.5;
const DEFAULT_RECONNECT_JITTER: f64 = 0.2;
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(2 * 60);
const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_DISPATCH_WORKERS: usize = 4;
const DEFAULT_DISPATCH_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub base_url: String,
    /// First delay after a failed dial.
    pub reconnect_min: Duration,
    /// Upper bound for any reconnect delay, jitter included.
    pub reconnect_max: Duration,
    pub reconnect_factor: f64,
    /// Fraction of the delay randomized in both directions, 0.0..=1.0.
    pub reconnect_jitter: f64,
    pub handshake_timeout: Duration,
    pub ping_interval: Duration,
    /// Longest a read waits for any frame (data, ping or pong).
    pub pong_timeout: Duration,
    pub dispatch_workers: usize,
    pub dispatch_queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: MAINNET_WS_STREAM_URL.to_string(),
            reconnect_min: DEFAULT_RECONNECT_MIN,
            reconnect_max: DEFAULT_RECONNECT_MAX,
            reconnect_factor: DEFAULT_RECONNECT_FACTOR,
            reconnect_jitter: DEFAULT_RECONNECT_JITTER,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
            dispatch_queue_capacity: DEFAULT_DISPATCH_QUEUE_CAPACITY,
        }
    }
}

impl StreamConfig {
    pub fn new(is_testnet: bool) -> Self {
        let base_url = if is_testnet {
            TESTNET_WS_STREAM_URL
        } else {
            MAINNET_WS_STREAM_URL
        };
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Builds a config from the process environment, falling back to defaults
    /// for every variable that is not set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_testnet = match lookup("BINANCE_TESTNET") {
            Some(v) => v.parse::<bool>().map_err(|_| {
                BinanceError::ConfigError(format!("BINANCE_TESTNET must be true or false, got '{}'", v))
            })?,
            None => false,
        };
        let mut config = Self::new(is_testnet);

        if let Some(url) = lookup("BINANCE_WS_URL") {
            config.base_url = url;
        }
        if let Some(ms) = parse_u64(&lookup, "BINANCE_WS_RECONNECT_MIN_MS")? {
            config.reconnect_min = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "BINANCE_WS_RECONNECT_MAX_MS")? {
            config.reconnect_max = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_u64(&lookup, "BINANCE_WS_PING_INTERVAL_SECS")? {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&lookup, "BINANCE_WS_PONG_TIMEOUT_SECS")? {
            config.pong_timeout = Duration::from_secs(secs);
        }
        if let Some(workers) = parse_u64(&lookup, "BINANCE_WS_DISPATCH_WORKERS")? {
            config.dispatch_workers = workers as usize;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)?;
        if self.reconnect_min.is_zero() || self.reconnect_max.is_zero() {
            return Err(BinanceError::ConfigError(
                "reconnect delays must be greater than zero".to_string(),
            ));
        }
        if self.reconnect_min > self.reconnect_max {
            return Err(BinanceError::ConfigError(format!(
                "reconnect_min ({:?}) exceeds reconnect_max ({:?})",
                self.reconnect_min, self.reconnect_max
            )));
        }
        if !(self.reconnect_factor >= 1.0) {
            return Err(BinanceError::ConfigError(format!(
                "reconnect_factor must be >= 1.0, got {}",
                self.reconnect_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(BinanceError::ConfigError(format!(
                "reconnect_jitter must be within [0, 1], got {}",
                self.reconnect_jitter
            )));
        }
        if self.handshake_timeout.is_zero()
            || self.ping_interval.is_zero()
            || self.pong_timeout.is_zero()
        {
            return Err(BinanceError::ConfigError(
                "handshake_timeout, ping_interval and pong_timeout must be greater than zero"
                    .to_string(),
            ));
        }
        if self.dispatch_workers == 0 || self.dispatch_queue_capacity == 0 {
            return Err(BinanceError::ConfigError(
                "dispatch_workers and dispatch_queue_capacity must be greater than zero"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            BinanceError::ConfigError(format!("{} must be an unsigned integer, got '{}'", key, raw))
        }),
        None => Ok(None),
    }
}
