//! Evaluation configuration loaded from TOML.
//!
//! One file describes every analyte the lab runs QC for: its control levels
//! with their statistical baselines, the sigma metric, and which SD basis to
//! score against.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use iqc_core::domain::{AnalyteId, LevelId, SdBasis, StatParams};
use iqc_core::{EvaluatorOptions, RuleScheme};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("analyte '{0}' is defined more than once")]
    DuplicateAnalyte(AnalyteId),

    #[error("analyte '{analyte}' defines level '{level}' more than once")]
    DuplicateLevel { analyte: AnalyteId, level: LevelId },

    #[error("analyte '{0}' has no control levels")]
    NoLevels(AnalyteId),
}

/// Options that apply to every analyte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOptions {
    /// Report 1_2s warnings in every sigma tier, not only below 3 sigma.
    #[serde(default)]
    pub always_report_1_2s: bool,
    /// Enable cross-level 4_1s/10x/9x blocks.
    #[serde(default)]
    pub cross_level_runs: bool,
}

impl EvaluationOptions {
    pub fn evaluator_options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            cross_level_runs: self.cross_level_runs,
        }
    }
}

/// Baseline of one control level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub id: LevelId,
    pub mean: f64,
    pub sd: f64,
    /// CV in percent. Only used when the analyte scores against CV.
    #[serde(default)]
    pub cv: f64,
    /// Overrides the analyte sigma for this level.
    #[serde(default)]
    pub sigma: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteConfig {
    pub id: AnalyteId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub sigma: f64,
    #[serde(default)]
    pub sd_basis: SdBasis,
    #[serde(default)]
    pub levels: Vec<LevelConfig>,
}

impl AnalyteConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Statistical parameters per level, with the SD basis applied.
    pub fn level_params(&self) -> BTreeMap<LevelId, StatParams> {
        self.levels
            .iter()
            .map(|level| {
                let params = StatParams::new(
                    level.mean,
                    level.sd,
                    level.cv,
                    level.sigma.unwrap_or(self.sigma),
                );
                (level.id.clone(), params.resolve(self.sd_basis))
            })
            .collect()
    }

    /// Sigma that selects the rule set: the weakest level decides.
    ///
    /// NaN anywhere yields NaN so the rule lookup rejects it instead of
    /// `f64::min` quietly skipping it.
    pub fn effective_sigma(&self) -> f64 {
        let mut lowest: Option<f64> = None;
        for sigma in self.levels.iter().map(|l| l.sigma.unwrap_or(self.sigma)) {
            if sigma.is_nan() {
                return f64::NAN;
            }
            lowest = Some(lowest.map_or(sigma, |low| low.min(sigma)));
        }
        lowest.unwrap_or(self.sigma)
    }

    pub fn rule_scheme(&self) -> RuleScheme {
        RuleScheme::for_level_count(self.levels.len())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub options: EvaluationOptions,
    #[serde(default)]
    pub analytes: Vec<AnalyteConfig>,
}

impl EvaluationConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Structural checks only. Numeric invariants (sd > 0, sigma >= 0) are
    /// enforced by the engine when the values are used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for analyte in &self.analytes {
            if !seen.insert(&analyte.id) {
                return Err(ConfigError::DuplicateAnalyte(analyte.id.clone()));
            }
            if analyte.levels.is_empty() {
                return Err(ConfigError::NoLevels(analyte.id.clone()));
            }
            let mut levels = BTreeSet::new();
            for level in &analyte.levels {
                if !levels.insert(&level.id) {
                    return Err(ConfigError::DuplicateLevel {
                        analyte: analyte.id.clone(),
                        level: level.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn analyte(&self, id: &AnalyteId) -> Option<&AnalyteConfig> {
        self.analytes.iter().find(|a| &a.id == id)
    }
}
