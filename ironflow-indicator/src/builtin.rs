//! Built-in indicator implementations, registered into a [`crate::catalog::VariantCatalog`]
//! by their `_factory` functions.

use crate::value::IndicatorOutput;
use crate::variant::VariantParams;
use crate::window::SlidingWindow;
use crate::Indicator;
use indexmap::IndexMap;
use ironflow_core::Timestamp;

fn suppress_non_finite(value: f64) -> Option<IndicatorOutput> {
    if value.is_finite() {
        Some(IndicatorOutput::Scalar(value))
    } else {
        None
    }
}

/// Simple moving average over a trailing time window.
#[derive(Debug)]
pub struct Sma {
    window: SlidingWindow,
    expected_samples: u64,
    fill_ratio: f64,
}

impl Indicator for Sma {
    fn on_sample(&mut self, ts: Timestamp, price: f64) -> Option<IndicatorOutput> {
        self.window.push(ts, price);
        if !self.window.is_warm(self.expected_samples, self.fill_ratio) {
            return None;
        }
        let sum: f64 = self.window.values().sum();
        let mean = sum / self.window.len() as f64;
        suppress_non_finite(mean)
    }
}

pub fn sma_factory(p: &VariantParams) -> Box<dyn Indicator> {
    Box::new(Sma {
        window: SlidingWindow::new(p.get("window_ms").copied().unwrap_or(60_000.0) as u64),
        expected_samples: expected_sample_count(p),
        fill_ratio: fill_ratio(p),
    })
}

/// Exponential moving average. Warmup tracked by sample count within `window_ms`, defined
/// purely in terms of the window rather than the smoothing period.
#[derive(Debug)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
    window: SlidingWindow,
    expected_samples: u64,
    fill_ratio: f64,
}

impl Indicator for Ema {
    fn on_sample(&mut self, ts: Timestamp, price: f64) -> Option<IndicatorOutput> {
        self.window.push(ts, price);
        self.value = Some(match self.value {
            None => price,
            Some(previous) => self.alpha * price + (1.0 - self.alpha) * previous,
        });
        if !self.window.is_warm(self.expected_samples, self.fill_ratio) {
            return None;
        }
        self.value.and_then(suppress_non_finite)
    }
}

pub fn ema_factory(p: &VariantParams) -> Box<dyn Indicator> {
    let period = p.get("period").copied().unwrap_or(20.0).max(1.0);
    Box::new(Ema {
        alpha: 2.0 / (period + 1.0),
        value: None,
        window: SlidingWindow::new(p.get("window_ms").copied().unwrap_or(60_000.0) as u64),
        expected_samples: expected_sample_count(p),
        fill_ratio: fill_ratio(p),
    })
}

/// Wilder's RSI over the last `period` changes observed within `window_ms`.
#[derive(Debug)]
pub struct Rsi {
    period: f64,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
    previous_price: Option<f64>,
    window: SlidingWindow,
    expected_samples: u64,
    fill_ratio: f64,
}

impl Indicator for Rsi {
    fn on_sample(&mut self, ts: Timestamp, price: f64) -> Option<IndicatorOutput> {
        self.window.push(ts, price);
        let change = match self.previous_price.replace(price) {
            Some(previous) => price - previous,
            None => return None,
        };
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        self.avg_gain = Some(match self.avg_gain {
            None => gain,
            Some(prev) => (prev * (self.period - 1.0) + gain) / self.period,
        });
        self.avg_loss = Some(match self.avg_loss {
            None => loss,
            Some(prev) => (prev * (self.period - 1.0) + loss) / self.period,
        });

        if !self.window.is_warm(self.expected_samples, self.fill_ratio) {
            return None;
        }

        let (avg_gain, avg_loss) = (self.avg_gain?, self.avg_loss?);
        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        };
        suppress_non_finite(rsi)
    }
}

pub fn rsi_factory(p: &VariantParams) -> Box<dyn Indicator> {
    Box::new(Rsi {
        period: p.get("period").copied().unwrap_or(14.0).max(1.0),
        avg_gain: None,
        avg_loss: None,
        previous_price: None,
        window: SlidingWindow::new(p.get("window_ms").copied().unwrap_or(60_000.0) as u64),
        expected_samples: expected_sample_count(p),
        fill_ratio: fill_ratio(p),
    })
}

/// Bollinger Bands: emits a single composite `{upper, mid, lower}` event.
#[derive(Debug)]
pub struct BollingerBands {
    window: SlidingWindow,
    std_dev_multiplier: f64,
    expected_samples: u64,
    fill_ratio: f64,
}

impl Indicator for BollingerBands {
    fn on_sample(&mut self, ts: Timestamp, price: f64) -> Option<IndicatorOutput> {
        self.window.push(ts, price);
        if !self.window.is_warm(self.expected_samples, self.fill_ratio) {
            return None;
        }
        let n = self.window.len() as f64;
        let mean: f64 = self.window.values().sum::<f64>() / n;
        let variance: f64 = self.window.values().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let upper = mean + self.std_dev_multiplier * std_dev;
        let lower = mean - self.std_dev_multiplier * std_dev;
        if ![mean, upper, lower].iter().all(|v| v.is_finite()) {
            return None;
        }

        let mut fields = IndexMap::new();
        fields.insert("upper".to_string(), upper);
        fields.insert("mid".to_string(), mean);
        fields.insert("lower".to_string(), lower);
        Some(IndicatorOutput::Composite(fields))
    }
}

pub fn bollinger_bands_factory(p: &VariantParams) -> Box<dyn Indicator> {
    Box::new(BollingerBands {
        window: SlidingWindow::new(p.get("window_ms").copied().unwrap_or(60_000.0) as u64),
        std_dev_multiplier: p.get("std_dev").copied().unwrap_or(2.0),
        expected_samples: expected_sample_count(p),
        fill_ratio: fill_ratio(p),
    })
}

/// Percentage change between the oldest and newest sample in the trailing window — used
/// by strategies as a "pump magnitude" style momentum signal.
#[derive(Debug)]
pub struct PercentChange {
    window: SlidingWindow,
    expected_samples: u64,
    fill_ratio: f64,
}

impl Indicator for PercentChange {
    fn on_sample(&mut self, ts: Timestamp, price: f64) -> Option<IndicatorOutput> {
        self.window.push(ts, price);
        if !self.window.is_warm(self.expected_samples, self.fill_ratio) {
            return None;
        }
        let oldest = self.window.oldest()?;
        if oldest == 0.0 {
            return None;
        }
        let pct = (price - oldest) / oldest * 100.0;
        suppress_non_finite(pct)
    }
}

pub fn percent_change_factory(p: &VariantParams) -> Box<dyn Indicator> {
    Box::new(PercentChange {
        window: SlidingWindow::new(p.get("window_ms").copied().unwrap_or(60_000.0) as u64),
        expected_samples: expected_sample_count(p),
        fill_ratio: fill_ratio(p),
    })
}

fn expected_sample_count(p: &VariantParams) -> u64 {
    let window_ms = p.get("window_ms").copied().unwrap_or(60_000.0).max(0.0) as u64;
    let bar_interval_ms = p.get("bar_interval_ms").copied().unwrap_or(1_000.0).max(1.0) as u64;
    // Deliberately not floored to 1: a window shorter than the sampling interval can never
    // hold enough samples at once, and `SlidingWindow::is_warm` treats 0 as "never warms".
    window_ms / bar_interval_ms
}

fn fill_ratio(p: &VariantParams) -> f64 {
    p.get("fill_ratio").copied().unwrap_or(0.8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(indicator: &mut dyn Indicator, prices: &[f64], step_ms: i64) -> Vec<Option<IndicatorOutput>> {
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| indicator.on_sample(Timestamp::from_millis(i as i64 * step_ms), *price))
            .collect()
    }

    #[test]
    fn sma_suppresses_until_warm_then_averages() {
        let params = crate::catalog::params(&[("window_ms", 5_000.0), ("bar_interval_ms", 1_000.0)]);
        let mut sma = sma_factory(&params);
        let outputs = feed(sma.as_mut(), &[1.0, 2.0, 3.0, 4.0, 5.0], 1_000);
        assert!(outputs[0].is_none());
        assert!(outputs[3].is_some());
        let last = outputs[4].as_ref().unwrap().as_scalar().unwrap();
        assert!((last - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_never_emits_nan_even_with_zero_losses() {
        let params = crate::catalog::params(&[("window_ms", 5_000.0), ("bar_interval_ms", 1_000.0), ("period", 3.0)]);
        let mut rsi = rsi_factory(&params);
        let outputs = feed(rsi.as_mut(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 1_000);
        for output in outputs.into_iter().flatten() {
            assert!(output.is_finite());
        }
    }

    #[test]
    fn bollinger_emits_composite_with_ordered_bands() {
        let params = crate::catalog::params(&[("window_ms", 5_000.0), ("bar_interval_ms", 1_000.0)]);
        let mut bb = bollinger_bands_factory(&params);
        let outputs = feed(bb.as_mut(), &[10.0, 11.0, 9.0, 10.0, 12.0], 1_000);
        let last = outputs.last().unwrap().clone().unwrap();
        if let IndicatorOutput::Composite(fields) = last {
            assert!(fields["upper"] >= fields["mid"]);
            assert!(fields["mid"] >= fields["lower"]);
        } else {
            panic!("expected composite output");
        }
    }

    #[test]
    fn window_shorter_than_sample_interval_never_warms_up() {
        let params = crate::catalog::params(&[("window_ms", 500.0), ("bar_interval_ms", 1_000.0)]);
        let mut sma = sma_factory(&params);
        let outputs = feed(sma.as_mut(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 1_000);
        assert!(outputs.iter().all(|output| output.is_none()));
    }

    #[test]
    fn percent_change_computes_pump_magnitude() {
        let params = crate::catalog::params(&[("window_ms", 3_000.0), ("bar_interval_ms", 1_000.0)]);
        let mut pct = percent_change_factory(&params);
        let outputs = feed(pct.as_mut(), &[100.0, 104.0, 108.0], 1_000);
        let last = outputs.last().unwrap().as_ref().unwrap().as_scalar().unwrap();
        assert!((last - 8.0).abs() < 1e-9);
    }
}
