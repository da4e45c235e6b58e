//! Time-bounded sliding window used by built-in indicators to track warmup progress.

use ironflow_core::Timestamp;
use std::collections::VecDeque;

/// A ring of `(ts, value)` samples bounded by a trailing time window rather than a fixed
/// count, since warmup is defined in terms of `window_ms`.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window_ms: u64,
    samples: VecDeque<(Timestamp, f64)>,
}

impl SlidingWindow {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            samples: VecDeque::new(),
        }
    }

    /// Pushes a new sample and evicts anything older than `ts - window_ms`.
    pub fn push(&mut self, ts: Timestamp, value: f64) {
        self.samples.push_back((ts, value));
        let cutoff = ts.as_millis().saturating_sub(self.window_ms as i64);
        while let Some((front_ts, _)) = self.samples.front() {
            if front_ts.as_millis() < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|(_, v)| *v)
    }

    pub fn oldest(&self) -> Option<f64> {
        self.samples.front().map(|(_, v)| *v)
    }

    pub fn newest(&self) -> Option<f64> {
        self.samples.back().map(|(_, v)| *v)
    }

    /// `expected_sample_count == 0` means the window is shorter than the interval between
    /// samples arriving (e.g. `window_ms < bar_interval_ms`): at most one sample can ever be
    /// in the window at once, so warmup can never complete, by design rather than by
    /// accident of rounding.
    pub fn is_warm(&self, expected_sample_count: u64, fill_ratio: f64) -> bool {
        if expected_sample_count == 0 {
            return false;
        }
        let required = (expected_sample_count as f64 * fill_ratio).ceil() as usize;
        self.samples.len() >= required.max(1)
    }
}
