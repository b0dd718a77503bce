//! RuleEvaluator: runs every active rule and merges the violations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{RuleId, Violation, ZScorePoint};
use crate::error::QcError;
use crate::sigma::{active_rules_for, RuleScheme, RuleSet};

use super::{create_rule, SeriesLayout, WestgardRule};

/// Knobs that change how rules scan, not which rules are active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorOptions {
    /// Also evaluate 4_1s, 10x and 9x over blocks of consecutive run events
    /// spanning every level.
    #[serde(default)]
    pub cross_level_runs: bool,
}

/// Evaluates a fixed set of rules over z-score series.
///
/// Holds no state between calls; one evaluator can be shared across threads
/// and reused for any number of analytes.
pub struct RuleEvaluator {
    rules: Vec<Box<dyn WestgardRule>>,
}

impl fmt::Debug for RuleEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEvaluator")
            .field("rules", &self.active_rules())
            .finish()
    }
}

impl RuleEvaluator {
    pub fn new(rules: &RuleSet, options: EvaluatorOptions) -> Self {
        Self {
            rules: rules.iter().map(|&id| create_rule(id, options)).collect(),
        }
    }

    /// Evaluator for the rule set a sigma metric calls for.
    pub fn for_sigma(
        sigma: f64,
        scheme: RuleScheme,
        options: EvaluatorOptions,
    ) -> Result<Self, QcError> {
        Ok(Self::new(&active_rules_for(sigma, scheme)?, options))
    }

    pub fn active_rules(&self) -> RuleSet {
        self.rules.iter().map(|rule| rule.id()).collect()
    }

    /// Scan `points` with every rule.
    ///
    /// Returns one violation per (point, rule) that fires, ordered by point
    /// index then rule id. When a rule is satisfied by several windows ending
    /// on the same point, their contributing points are merged.
    pub fn evaluate(&self, points: &[ZScorePoint]) -> Vec<Violation> {
        let layout = SeriesLayout::new(points);
        let mut merged: BTreeMap<(usize, RuleId), BTreeSet<usize>> = BTreeMap::new();

        for rule in &self.rules {
            if points.len() < rule.window() {
                continue;
            }
            for violation in rule.scan(&layout) {
                merged
                    .entry((violation.point_index, violation.rule_id))
                    .or_default()
                    .extend(violation.contributing_points);
            }
        }

        let violations: Vec<Violation> = merged
            .into_iter()
            .map(|((_, rule_id), contributing)| {
                Violation::new(rule_id, contributing.into_iter().collect())
            })
            .collect();

        debug!(
            points = points.len(),
            rules = self.rules.len(),
            violations = violations.len(),
            "westgard evaluation complete"
        );
        violations
    }
}
