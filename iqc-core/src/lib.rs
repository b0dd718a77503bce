//! IQC Core — z-scores, sigma-scaled Westgard rules, Levey-Jennings annotations.
//!
//! This crate is the statistical engine of the internal quality control
//! workflow:
//! - Domain types (control runs, statistical parameters, z-score points, violations)
//! - Z-score conversion with per-level and per-event ordering
//! - Westgard multirule evaluation, two-level and three-level families
//! - Sigma-metric scaling of the active rule set
//! - Chart-ready markers and per-run QC verdicts
//!
//! Everything here is synchronous and free of I/O. Configuration files, CSV
//! input and result export live in `iqc-runner`.

pub mod chart;
pub mod domain;
pub mod error;
pub mod rules;
pub mod sigma;
pub mod verdict;
pub mod zscore;

pub use error::QcError;
pub use rules::{EvaluatorOptions, RuleEvaluator};
pub use sigma::{active_rules, active_rules_for, RuleScheme, RuleSet, SigmaTier};
pub use zscore::{score_runs, z, ScoredSeries};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine types can cross threads.
    ///
    /// The runner evaluates analytes in parallel, sharing one config and
    /// moving results back to the caller.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::ControlRun>();
        require_sync::<domain::ControlRun>();
        require_send::<domain::StatParams>();
        require_sync::<domain::StatParams>();
        require_send::<domain::ZScorePoint>();
        require_sync::<domain::ZScorePoint>();
        require_send::<domain::Violation>();
        require_sync::<domain::Violation>();

        // Engine types
        require_send::<RuleEvaluator>();
        require_sync::<RuleEvaluator>();
        require_send::<ScoredSeries>();
        require_sync::<ScoredSeries>();
        require_send::<QcError>();
        require_sync::<QcError>();

        // Output types
        require_send::<chart::LeveyJenningsChart>();
        require_sync::<chart::LeveyJenningsChart>();
        require_send::<verdict::RunVerdict>();
        require_sync::<verdict::RunVerdict>();
    }

    #[test]
    fn end_to_end_scoring_and_evaluation() {
        use chrono::NaiveDate;
        use domain::{AnalyteId, ControlRun, LevelId, StatParams};
        use std::collections::BTreeMap;

        let mut params = BTreeMap::new();
        params.insert(LevelId::new("L1"), StatParams::new(5.0, 0.1, 2.0, 3.5));

        let day = |d: u32| {
            NaiveDate::from_ymd_opt(2024, 3, d)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap()
        };
        let runs: Vec<ControlRun> = [5.0, 5.25, 5.26, 4.98]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                ControlRun::new(
                    format!("r{i}"),
                    day(i as u32 + 1),
                    AnalyteId::new("glucose"),
                    LevelId::new("L1"),
                    v,
                )
            })
            .collect();

        let series = score_runs(&runs, &params).unwrap();
        let evaluator =
            RuleEvaluator::for_sigma(3.5, RuleScheme::TwoLevel, EvaluatorOptions::default())
                .unwrap();
        let violations = evaluator.evaluate(&series.points);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, domain::RuleId::TwoTwoS);
        assert_eq!(violations[0].point_index, 2);

        let verdicts = verdict::summarize_runs(&series.points, &violations);
        assert_eq!(verdicts.len(), 4);
        assert!(verdicts[2].is_rejected());
    }
}
