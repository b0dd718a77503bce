//! Statistical baseline for one (analyte, level) pair.

use serde::{Deserialize, Serialize};

/// Mean, SD, CV% and sigma metric of a control material at one level.
///
/// Values are supplied by the lab; nothing here estimates them. The
/// `sd > 0` and `sigma >= 0` invariants are checked where the values are
/// used (`zscore::z`, `sigma::active_rules`), not on construction.
/// Re-configuring statistics means building a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatParams {
    pub mean: f64,
    pub sd: f64,
    /// Coefficient of variation, in percent.
    pub cv: f64,
    pub sigma: f64,
}

impl StatParams {
    pub fn new(mean: f64, sd: f64, cv: f64, sigma: f64) -> Self {
        Self { mean, sd, cv, sigma }
    }

    /// Copy of these parameters with `sd = |mean| * cv / 100`.
    ///
    /// Labs often score against a target CV instead of the empirical SD.
    pub fn with_sd_from_cv(&self) -> Self {
        Self {
            sd: self.mean.abs() * self.cv / 100.0,
            ..*self
        }
    }

    /// Apply an SD basis, returning the parameters the z-score should use.
    pub fn resolve(&self, basis: SdBasis) -> Self {
        match basis {
            SdBasis::Empirical => *self,
            SdBasis::FromCv => self.with_sd_from_cv(),
        }
    }
}

/// Which SD a configuration scores against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdBasis {
    /// The SD as entered.
    #[default]
    Empirical,
    /// SD derived from the mean and the target CV%.
    FromCv,
}
