//! Market state evaluation
//!
//! Rolling return and volume statistics that raise the named flags used by
//! exit-plan invalidation conditions.

use crate::feed::PriceTick;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, VecDeque};

/// Flag raised when the latest return is an outlier
pub const VOLATILITY_SPIKE: &str = "volatility_spike";
/// Flag raised when the latest volume is an outlier
pub const VOLUME_SPIKE: &str = "volume_spike";

/// Observations required before any flag can fire
const MIN_SAMPLES: usize = 10;
/// Outlier threshold, in standard deviations of past returns
const RETURN_SIGMAS: f64 = 3.0;
/// Floor for the return deviation, so a flat window does not flag every tick
const MIN_RETURN_SIGMA: f64 = 0.001;
/// Outlier threshold, as a multiple of mean past volume
const VOLUME_MULTIPLE: f64 = 3.0;

/// Named conditions currently signalled true
pub type MarketFlags = BTreeSet<String>;

/// Rolling evaluator over recent ticks
pub struct MarketStateEvaluator {
    /// Window duration for the statistics
    window: Duration,
    /// (timestamp, price, volume) history
    samples: VecDeque<(DateTime<Utc>, f64, f64)>,
}

impl MarketStateEvaluator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Add a tick and drop observations that left the window
    pub fn update(&mut self, tick: &PriceTick) {
        let price: f64 = tick.price.try_into().unwrap_or(0.0);
        let volume: f64 = tick.volume.try_into().unwrap_or(0.0);
        if price <= 0.0 {
            return;
        }
        self.samples.push_back((tick.timestamp, price, volume));

        let cutoff = tick.timestamp - self.window;
        while let Some((ts, _, _)) = self.samples.front() {
            if *ts < cutoff {
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

    /// Simple returns between consecutive samples
    fn returns(&self) -> Vec<f64> {
        self.samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|((_, prev, _), (_, curr, _))| (curr - prev) / prev)
            .collect()
    }

    /// Population stddev of returns in the window
    pub fn volatility(&self) -> Option<f64> {
        let returns = self.returns();
        if returns.len() < 2 {
            return None;
        }
        Some(std_dev(&returns))
    }

    /// Latest return more than 3σ away from the mean of the earlier ones
    pub fn is_volatility_spike(&self) -> bool {
        let returns = self.returns();
        let Some((last, history)) = returns.split_last() else {
            return false;
        };
        if history.len() < MIN_SAMPLES {
            return false;
        }
        let mean = history.iter().sum::<f64>() / history.len() as f64;
        let sigma = std_dev(history).max(MIN_RETURN_SIGMA);
        (last - mean).abs() > RETURN_SIGMAS * sigma
    }

    /// Latest volume above 3× the mean of the earlier ones
    pub fn is_volume_spike(&self) -> bool {
        let Some((_, _, last)) = self.samples.back() else {
            return false;
        };
        let history = self.samples.len() - 1;
        if history < MIN_SAMPLES {
            return false;
        }
        let mean = self
            .samples
            .iter()
            .take(history)
            .map(|(_, _, v)| v)
            .sum::<f64>()
            / history as f64;
        mean > 0.0 && *last > VOLUME_MULTIPLE * mean
    }

    /// Flags currently signalled true
    pub fn flags(&self) -> MarketFlags {
        let mut flags = MarketFlags::new();
        if self.is_volatility_spike() {
            flags.insert(VOLATILITY_SPIKE.to_string());
        }
        if self.is_volume_spike() {
            flags.insert(VOLUME_SPIKE.to_string());
        }
        flags
    }

    /// Latest observed price, if any
    pub fn last_price(&self) -> Option<Decimal> {
        self.samples
            .back()
            .and_then(|(_, price, _)| Decimal::try_from(*price).ok())
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
