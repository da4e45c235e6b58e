//! Top-level process configuration: a TOML file merged with `IRONFLOW_*` environment
//! overrides, following the same two-step load-then-override shape as `SystemConfig`
//! elsewhere (there, instrument/execution tables loaded from a config file; here, the
//! bus/indicator/execution/session tuning knobs every binary needs).
//!
//! There is no external `config`-crate dependency: the merge is a short, explicit function
//! per field, which keeps the precedence (env overrides file, file overrides built-in
//! default) easy to read straight off the source.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub indicator_queue_capacity: usize,
    pub order_queue_capacity: usize,
    pub position_queue_capacity: usize,
    pub publish_deadline_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            indicator_queue_capacity: 256,
            order_queue_capacity: 64,
            position_queue_capacity: 64,
            publish_deadline_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Fraction of a variant's configured window that must be observed before it emits a
    /// value instead of staying in warmup.
    pub warmup_ratio: f64,
    /// Minimum absolute change from a variant's last emitted value required to emit again.
    pub epsilon: f64,
    /// Force an emission at least every `N` non-stale samples even if the value hasn't
    /// moved by more than `epsilon`. `0` disables tick-through.
    pub tick_through_every: u32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { warmup_ratio: 0.8, epsilon: 1e-9, tick_through_every: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub staleness_tolerance_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self { staleness_tolerance_ms: 500 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub slippage_bps: f64,
    pub commission_bps: f64,
    pub min_qty: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { slippage_bps: 5.0, commission_bps: 2.0, min_qty: 0.0001 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaultsConfig {
    pub default_budget_cap: f64,
    /// Number of activation failures during `start` tolerated before the session is marked
    /// `degraded` rather than `Failed`.
    pub degraded_failure_threshold: usize,
}

impl Default for SessionDefaultsConfig {
    fn default() -> Self {
        Self { default_budget_cap: 10_000.0, degraded_failure_threshold: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub bus: BusConfig,
    pub indicator: IndicatorConfig,
    pub market: MarketConfig,
    pub execution: ExecutionConfig,
    pub session: SessionDefaultsConfig,
}

impl Config {
    /// Loads defaults, merges in `path` if it exists (an absent file is not an error — a
    /// binary may run entirely on defaults plus env overrides), then applies `IRONFLOW_*`
    /// environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| SessionError::Config(format!("reading {}: {e}", path.display())))?;
            toml::from_str(&raw).map_err(|e| SessionError::Config(format!("parsing {}: {e}", path.display())))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        apply_env_usize("IRONFLOW_BUS_INDICATOR_QUEUE_CAPACITY", &mut self.bus.indicator_queue_capacity);
        apply_env_usize("IRONFLOW_BUS_ORDER_QUEUE_CAPACITY", &mut self.bus.order_queue_capacity);
        apply_env_usize("IRONFLOW_BUS_POSITION_QUEUE_CAPACITY", &mut self.bus.position_queue_capacity);
        apply_env_u64("IRONFLOW_BUS_PUBLISH_DEADLINE_MS", &mut self.bus.publish_deadline_ms);
        apply_env_f64("IRONFLOW_INDICATOR_WARMUP_RATIO", &mut self.indicator.warmup_ratio);
        apply_env_f64("IRONFLOW_INDICATOR_EPSILON", &mut self.indicator.epsilon);
        apply_env_u32("IRONFLOW_INDICATOR_TICK_THROUGH_EVERY", &mut self.indicator.tick_through_every);
        apply_env_u64("IRONFLOW_MARKET_STALENESS_TOLERANCE_MS", &mut self.market.staleness_tolerance_ms);
        apply_env_f64("IRONFLOW_EXECUTION_SLIPPAGE_BPS", &mut self.execution.slippage_bps);
        apply_env_f64("IRONFLOW_EXECUTION_COMMISSION_BPS", &mut self.execution.commission_bps);
        apply_env_f64("IRONFLOW_EXECUTION_MIN_QTY", &mut self.execution.min_qty);
        apply_env_f64("IRONFLOW_SESSION_DEFAULT_BUDGET_CAP", &mut self.session.default_budget_cap);
        apply_env_usize("IRONFLOW_SESSION_DEGRADED_FAILURE_THRESHOLD", &mut self.session.degraded_failure_threshold);
    }
}

fn apply_env_usize(key: &str, slot: &mut usize) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, raw, "ignoring unparsable environment override"),
        }
    }
}

fn apply_env_u32(key: &str, slot: &mut u32) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, raw, "ignoring unparsable environment override"),
        }
    }
}

fn apply_env_u64(key: &str, slot: &mut u64) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, raw, "ignoring unparsable environment override"),
        }
    }
}

fn apply_env_f64(key: &str, slot: &mut f64) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, raw, "ignoring unparsable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/ironflow.toml").unwrap();
        assert_eq!(config, Config::default());
    }
}
