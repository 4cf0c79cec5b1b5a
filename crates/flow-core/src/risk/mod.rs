//! Risk classification for inflow forecasts
//!
//! Pure, stateless analysis of a short forecast vector:
//!
//! - **Low inflow** - the weakest period is below the configured threshold
//!   (`high` severity when far below it, `medium` otherwise)
//! - **Declining trend** - the last period dropped more than the configured
//!   fraction relative to the first (`medium` severity)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flow_core::{classify, ForecastVector, RiskThresholds};
//!
//! let forecast = ForecastVector::new(vec![2.6e6, 2.7e6, 2.55e6, 2.65e6])?;
//! let report = classify(&forecast, &RiskThresholds::default())?;
//! assert!(!report.has_risk);
//! ```

pub mod classifier;
pub mod types;

pub use classifier::classify;
pub use types::{RiskFinding, RiskReport, Severity};
