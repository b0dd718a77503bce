//! Per-analyte evaluation and the parallel batch runner.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use iqc_core::chart::{annotate, ChartMarker, LeveyJenningsChart};
use iqc_core::domain::{AnalyteId, ControlRun, RuleId, Violation, ZScorePoint};
use iqc_core::verdict::{summarize_runs, QcStatus, RunVerdict};
use iqc_core::{
    active_rules_for, score_runs, QcError, RuleEvaluator, RuleScheme, RuleSet, SigmaTier,
};

use crate::cache::EvaluationCache;
use crate::config::{AnalyteConfig, EvaluationConfig, EvaluationOptions};
use crate::data_loader::LoadedRuns;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("evaluation error: {0}")]
    Qc(#[from] QcError),
    #[error("failed to fingerprint evaluation input: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted evaluations.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything produced for one analyte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyteEvaluation {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub evaluation_id: String,
    pub analyte_id: AnalyteId,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub sigma: f64,
    pub tier: SigmaTier,
    pub scheme: RuleScheme,
    pub active_rules: RuleSet,
    pub run_count: usize,
    pub excluded_count: usize,
    pub points: Vec<ZScorePoint>,
    pub violations: Vec<Violation>,
    pub markers: Vec<ChartMarker>,
    pub verdicts: Vec<RunVerdict>,
    /// One message per run whose value could not be scored.
    pub malformed: Vec<String>,
}

impl AnalyteEvaluation {
    /// Worst verdict across all run events.
    pub fn status(&self) -> QcStatus {
        self.verdicts
            .iter()
            .map(|v| v.status)
            .max()
            .unwrap_or(QcStatus::Accepted)
    }

    pub fn count_with_status(&self, status: QcStatus) -> usize {
        self.verdicts.iter().filter(|v| v.status == status).count()
    }

    pub fn chart(&self) -> LeveyJenningsChart {
        LeveyJenningsChart::build(&self.points, &self.violations)
    }
}

/// Content fingerprint of one evaluation's inputs.
pub fn evaluation_id(
    analyte: &AnalyteConfig,
    options: &EvaluationOptions,
    runs: &[ControlRun],
) -> Result<String, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&SCHEMA_VERSION.to_le_bytes());
    hasher.update(&serde_json::to_vec(&(analyte, options))?);
    hasher.update(&serde_json::to_vec(runs)?);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Analyte that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteFailure {
    pub analyte_id: AnalyteId,
    pub error: String,
}

/// Outcome of evaluating every configured analyte against a run file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub dataset_hash: String,
    pub evaluations: Vec<AnalyteEvaluation>,
    pub failures: Vec<AnalyteFailure>,
    /// Analytes present in the runs but missing from the config.
    pub unknown_analytes: Vec<AnalyteId>,
    /// Configured analytes with no runs in the file.
    pub without_runs: Vec<AnalyteId>,
}

impl BatchResult {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Runner {
    cache: Option<EvaluationCache>,
}

impl Runner {
    pub fn new() -> Self {
        Self { cache: None }
    }

    pub fn with_cache(cache: EvaluationCache) -> Self {
        Self { cache: Some(cache) }
    }

    /// Score, evaluate and annotate one analyte's runs.
    ///
    /// Cache failures are logged and never fail the evaluation.
    pub fn evaluate_analyte(
        &self,
        analyte: &AnalyteConfig,
        options: &EvaluationOptions,
        runs: &[ControlRun],
    ) -> Result<AnalyteEvaluation, RunError> {
        let id = evaluation_id(analyte, options, runs)?;

        if let Some(cache) = &self.cache {
            match cache.get(&id) {
                Ok(Some(hit)) => {
                    debug!(analyte = %analyte.id, evaluation = %id, "cache hit");
                    return Ok(hit);
                }
                Ok(None) => debug!(analyte = %analyte.id, evaluation = %id, "cache miss"),
                Err(err) => warn!(analyte = %analyte.id, "cache read failed: {err:#}"),
            }
        }

        let sigma = analyte.effective_sigma();
        let tier = SigmaTier::from_sigma(sigma)?;
        let scheme = analyte.rule_scheme();
        let mut rules = active_rules_for(sigma, scheme)?;
        if options.always_report_1_2s {
            rules.insert(RuleId::OneTwoS);
        }

        let series = score_runs(runs, &analyte.level_params())?;
        let evaluator = RuleEvaluator::new(&rules, options.evaluator_options());
        let violations = evaluator.evaluate(&series.points);
        let markers = annotate(&series.points, &violations);
        let verdicts = summarize_runs(&series.points, &violations);

        let evaluation = AnalyteEvaluation {
            schema_version: SCHEMA_VERSION,
            evaluation_id: id,
            analyte_id: analyte.id.clone(),
            name: analyte.display_name().to_string(),
            unit: analyte.unit.clone(),
            sigma,
            tier,
            scheme,
            active_rules: rules,
            run_count: runs.len(),
            excluded_count: series.excluded,
            points: series.points,
            violations,
            markers,
            verdicts,
            malformed: series.malformed.iter().map(ToString::to_string).collect(),
        };

        info!(
            analyte = %evaluation.analyte_id,
            tier = %evaluation.tier,
            points = evaluation.points.len(),
            violations = evaluation.violations.len(),
            status = %evaluation.status(),
            "analyte evaluated"
        );

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(&evaluation) {
                warn!(analyte = %analyte.id, "cache write failed: {err:#}");
            }
        }

        Ok(evaluation)
    }

    /// Evaluate every configured analyte that has runs, in parallel.
    ///
    /// Results keep the config's analyte order. One analyte failing does not
    /// stop the others.
    pub fn evaluate_all(&self, config: &EvaluationConfig, loaded: &LoadedRuns) -> BatchResult {
        let unknown_analytes: Vec<AnalyteId> = loaded
            .runs
            .keys()
            .filter(|id| config.analyte(id).is_none())
            .cloned()
            .collect();
        for id in &unknown_analytes {
            warn!(analyte = %id, "runs found for an analyte missing from the config");
        }

        let without_runs: Vec<AnalyteId> = config
            .analytes
            .iter()
            .filter(|a| loaded.runs_for(&a.id).is_empty())
            .map(|a| a.id.clone())
            .collect();

        let outcomes: Vec<(AnalyteId, Result<AnalyteEvaluation, RunError>)> = config
            .analytes
            .par_iter()
            .filter(|a| !loaded.runs_for(&a.id).is_empty())
            .map(|a| {
                let outcome = self.evaluate_analyte(a, &config.options, loaded.runs_for(&a.id));
                (a.id.clone(), outcome)
            })
            .collect();

        let mut result = BatchResult {
            dataset_hash: loaded.dataset_hash.clone(),
            unknown_analytes,
            without_runs,
            ..BatchResult::default()
        };
        for (analyte_id, outcome) in outcomes {
            match outcome {
                Ok(evaluation) => result.evaluations.push(evaluation),
                Err(err) => {
                    warn!(analyte = %analyte_id, "evaluation failed: {err}");
                    result.failures.push(AnalyteFailure {
                        analyte_id,
                        error: err.to_string(),
                    });
                }
            }
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data_loader::read_runs;

    pub(crate) const CONFIG: &str = r#"
[[analytes]]
id = "glucose"
name = "Glucose"
unit = "mmol/L"
sigma = 4.5

[[analytes.levels]]
id = "L1"
mean = 5.0
sd = 0.1
cv = 2.0

[[analytes.levels]]
id = "L2"
mean = 15.0
sd = 0.5
cv = 3.3
"#;

    pub(crate) const RUNS: &str = "\
run_id,timestamp,analyte,level,value,state
g1,2024-05-01 08:00,glucose,L1,5.02,
g2,2024-05-01 08:00,glucose,L2,14.9,
g3,2024-05-02 08:00,glucose,L1,5.23,
g4,2024-05-02 08:00,glucose,L2,16.2,
g5,2024-05-03 08:00,glucose,L1,5.35,
g6,2024-05-03 08:00,glucose,L2,n/a,
";

    pub(crate) fn sample_evaluation() -> AnalyteEvaluation {
        let config = EvaluationConfig::from_toml(CONFIG).unwrap();
        let loaded = read_runs(RUNS.as_bytes()).unwrap();
        let glucose = &config.analytes[0];
        Runner::new()
            .evaluate_analyte(glucose, &config.options, loaded.runs_for(&glucose.id))
            .unwrap()
    }

    #[test]
    fn evaluates_one_analyte() {
        let evaluation = sample_evaluation();

        assert_eq!(evaluation.schema_version, SCHEMA_VERSION);
        assert_eq!(evaluation.tier, SigmaTier::Four);
        assert_eq!(evaluation.scheme, RuleScheme::TwoLevel);
        assert_eq!(evaluation.run_count, 6);
        assert_eq!(evaluation.points.len(), 5);
        assert_eq!(evaluation.malformed.len(), 1);
        assert!(evaluation.malformed[0].contains("g6"));

        let fired: Vec<(usize, RuleId)> = evaluation
            .violations
            .iter()
            .map(|v| (v.point_index, v.rule_id))
            .collect();
        assert_eq!(
            fired,
            vec![(3, RuleId::TwoTwoS), (4, RuleId::OneThreeS), (4, RuleId::TwoTwoS)]
        );
        assert_eq!(evaluation.status(), QcStatus::Rejected);
        assert_eq!(evaluation.count_with_status(QcStatus::Rejected), 2);
    }

    #[test]
    fn always_report_1_2s_adds_warnings() {
        let mut config = EvaluationConfig::from_toml(CONFIG).unwrap();
        config.options.always_report_1_2s = true;
        let loaded = read_runs(RUNS.as_bytes()).unwrap();
        let glucose = &config.analytes[0];
        let evaluation = Runner::new()
            .evaluate_analyte(glucose, &config.options, loaded.runs_for(&glucose.id))
            .unwrap();
        assert!(evaluation.active_rules.contains(&RuleId::OneTwoS));
        assert!(evaluation
            .violations
            .iter()
            .any(|v| v.rule_id == RuleId::OneTwoS));
    }

    #[test]
    fn evaluation_id_is_deterministic_and_input_sensitive() {
        let config = EvaluationConfig::from_toml(CONFIG).unwrap();
        let loaded = read_runs(RUNS.as_bytes()).unwrap();
        let glucose = &config.analytes[0];
        let runs = loaded.runs_for(&glucose.id);

        let a = evaluation_id(glucose, &config.options, runs).unwrap();
        let b = evaluation_id(glucose, &config.options, runs).unwrap();
        assert_eq!(a, b);

        let mut options = config.options;
        options.cross_level_runs = true;
        assert_ne!(a, evaluation_id(glucose, &options, runs).unwrap());
        assert_ne!(a, evaluation_id(glucose, &config.options, &runs[..4]).unwrap());
    }

    #[test]
    fn invalid_sd_fails_the_analyte() {
        let mut config = EvaluationConfig::from_toml(CONFIG).unwrap();
        config.analytes[0].levels[0].sd = 0.0;
        let loaded = read_runs(RUNS.as_bytes()).unwrap();
        let glucose = &config.analytes[0];
        let err = Runner::new()
            .evaluate_analyte(glucose, &config.options, loaded.runs_for(&glucose.id))
            .unwrap_err();
        assert!(matches!(err, RunError::Qc(e) if e.is_invalid_parameter()));
    }

    #[test]
    fn negative_sigma_is_an_evaluation_error() {
        let mut config = EvaluationConfig::from_toml(CONFIG).unwrap();
        config.analytes[0].sigma = -1.0;
        let loaded = read_runs(RUNS.as_bytes()).unwrap();
        let glucose = &config.analytes[0];
        let err = Runner::new()
            .evaluate_analyte(glucose, &config.options, loaded.runs_for(&glucose.id))
            .unwrap_err();
        assert!(matches!(err, RunError::Qc(ref e) if e.is_invalid_parameter()));
        assert!(err.to_string().starts_with("evaluation error: invalid parameter"));
    }
}
