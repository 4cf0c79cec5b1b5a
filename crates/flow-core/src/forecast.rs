//! Forecast vectors and forecast sources
//!
//! The forecasting model is an external oracle. The core only sees a short,
//! ordered vector of per-period inflow estimates (index 0 = nearest period),
//! produced by anything implementing [`ForecastSource`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum number of periods a forecast must contain
pub const MIN_PERIODS: usize = 2;

/// Ordered per-period inflow estimates, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ForecastVector(Vec<f64>);

impl ForecastVector {
    /// Build a forecast, rejecting short vectors and non-finite values
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.len() < MIN_PERIODS {
            return Err(Error::InvalidInput(format!(
                "forecast needs at least {} periods, got {}",
                MIN_PERIODS,
                values.len()
            )));
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "forecast value for period {} is not a finite number",
                index
            )));
        }
        Ok(Self(values))
    }

    /// Build a forecast that must contain exactly `periods` values
    pub fn with_periods(values: Vec<f64>, periods: usize) -> Result<Self> {
        if values.len() != periods {
            return Err(Error::InvalidInput(format!(
                "forecast must contain exactly {} periods, got {}",
                periods,
                values.len()
            )));
        }
        Self::new(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: construction guarantees at least two periods
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.0[0]
    }

    pub fn last(&self) -> f64 {
        self.0[self.0.len() - 1]
    }

    /// Smallest value and its index (earliest period wins ties)
    pub fn min_with_index(&self) -> (usize, f64) {
        let mut best = (0, self.0[0]);
        for (index, &value) in self.0.iter().enumerate().skip(1) {
            if value < best.1 {
                best = (index, value);
            }
        }
        best
    }

    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(&self) -> f64 {
        self.0.iter().sum::<f64>() / self.0.len() as f64
    }

    pub fn trend(&self) -> Trend {
        let (first, last) = (self.first(), self.last());
        if last < first {
            Trend::Declining
        } else if last > first {
            Trend::Growing
        } else {
            Trend::Flat
        }
    }

    pub fn summary(&self) -> ForecastSummary {
        ForecastSummary {
            values: self.0.clone(),
            min: self.min_with_index().1,
            max: self.max(),
            avg: self.mean(),
            trend: self.trend(),
        }
    }
}

impl<'de> Deserialize<'de> for ForecastVector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let values = Vec::<f64>::deserialize(deserializer)?;
        ForecastVector::new(values).map_err(serde::de::Error::custom)
    }
}

/// Direction of the forecast from the first to the last period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Growing,
    Declining,
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Growing => "growing",
            Trend::Declining => "declining",
            Trend::Flat => "flat",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compact description of a forecast for the result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub values: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub trend: Trend,
}

/// Capability that turns business history into a forecast
///
/// Any forecasting technique can sit behind this trait; the decision logic
/// never depends on how the numbers were produced.
pub trait ForecastSource: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Produce the forecast for the upcoming periods
    fn produce(&self, history: &[f64]) -> Result<ForecastVector>;
}

/// Forecast supplied directly by the caller (history is ignored)
#[derive(Debug, Clone)]
pub struct FixedForecast {
    values: Vec<f64>,
}

impl FixedForecast {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl ForecastSource for FixedForecast {
    fn name(&self) -> &str {
        "fixed"
    }

    fn produce(&self, _history: &[f64]) -> Result<ForecastVector> {
        ForecastVector::new(self.values.clone())
    }
}

/// Naive baseline: repeat the mean of the last `window` periods `horizon` times
///
/// Only useful for demos and smoke tests where no trained model is available.
#[derive(Debug, Clone)]
pub struct FlatBaselineForecaster {
    window: usize,
    horizon: usize,
}

impl FlatBaselineForecaster {
    pub fn new(window: usize, horizon: usize) -> Self {
        Self { window, horizon }
    }
}

impl Default for FlatBaselineForecaster {
    fn default() -> Self {
        Self::new(8, 4)
    }
}

impl ForecastSource for FlatBaselineForecaster {
    fn name(&self) -> &str {
        "flat_baseline"
    }

    fn produce(&self, history: &[f64]) -> Result<ForecastVector> {
        if self.window == 0 {
            return Err(Error::InvalidInput("baseline window must be positive".into()));
        }
        if history.len() < self.window {
            return Err(Error::InvalidInput(format!(
                "need at least {} periods of history, got {}",
                self.window,
                history.len()
            )));
        }
        let recent = &history[history.len() - self.window..];
        if recent.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(
                "history contains non-finite values".into(),
            ));
        }
        let mean = recent.iter().sum::<f64>() / self.window as f64;
        ForecastVector::new(vec![mean; self.horizon])
    }
}
