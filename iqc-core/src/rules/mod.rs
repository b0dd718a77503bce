//! Westgard rules — sliding-window multirule detection over z-scores.
//!
//! Each rule is a [`WestgardRule`] that scans a [`SeriesLayout`] on its own.
//! The [`RuleEvaluator`] runs every active rule independently and merges the
//! results: a point may carry several violations, and there is no
//! first-match-wins suppression.
//!
//! Rules never see statistical parameters or raw values, only z-scores plus
//! the level/event ordinals that define "consecutive" and "same run".

pub mod evaluator;
pub mod range;
pub mod single;
pub mod window;

use std::collections::BTreeMap;

use crate::domain::{LevelId, RuleId, Violation, ZScorePoint};

pub use evaluator::{EvaluatorOptions, RuleEvaluator};
pub use range::RangeRule;
pub use single::SinglePointRule;
pub use window::WindowRule;

/// Trait implemented by every rule.
///
/// # Architecture invariant
/// `scan` is a pure function of the layout: no interior state, no clock,
/// no global selection. Evaluating the same points twice must give the same
/// violations.
pub trait WestgardRule: Send + Sync {
    fn id(&self) -> RuleId;

    /// Smallest number of points the rule needs before it can fire.
    fn window(&self) -> usize;

    /// Scan the whole series and report every point where the rule fires.
    fn scan(&self, layout: &SeriesLayout<'_>) -> Vec<Violation>;
}

/// Index views over an ordered point slice: one lane per level and one
/// group per run event.
#[derive(Debug, Clone)]
pub struct SeriesLayout<'a> {
    points: &'a [ZScorePoint],
    lanes: Vec<Vec<usize>>,
    events: Vec<Vec<usize>>,
}

impl<'a> SeriesLayout<'a> {
    pub fn new(points: &'a [ZScorePoint]) -> Self {
        let mut lanes: BTreeMap<&LevelId, Vec<usize>> = BTreeMap::new();
        let mut events: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, point) in points.iter().enumerate() {
            lanes.entry(&point.level_id).or_default().push(i);
            events.entry(point.event).or_default().push(i);
        }

        let lanes = lanes
            .into_values()
            .map(|mut lane| {
                lane.sort_by_key(|&i| points[i].level_seq);
                lane
            })
            .collect();

        Self {
            points,
            lanes,
            events: events.into_values().collect(),
        }
    }

    pub fn points(&self) -> &'a [ZScorePoint] {
        self.points
    }

    /// Point indices per level, ordered by `level_seq`.
    pub fn lanes(&self) -> &[Vec<usize>] {
        &self.lanes
    }

    /// Point indices per run event, ordered by event ordinal.
    pub fn events(&self) -> &[Vec<usize>] {
        &self.events
    }

    /// Number of distinct levels in the series.
    pub fn level_count(&self) -> usize {
        self.lanes.len()
    }
}

/// Build the rule object for a rule id.
pub fn create_rule(id: RuleId, options: EvaluatorOptions) -> Box<dyn WestgardRule> {
    let across = options.cross_level_runs;
    match id {
        RuleId::OneTwoS => Box::new(SinglePointRule::one_2s()),
        RuleId::OneThreeS => Box::new(SinglePointRule::one_3s()),
        RuleId::TwoTwoS => Box::new(WindowRule::two_2s()),
        RuleId::RangeFourS => Box::new(RangeRule::r_4s()),
        RuleId::FourOneS => Box::new(WindowRule::four_1s().across_runs_if(across, 2)),
        RuleId::TenX => Box::new(WindowRule::ten_x().across_runs_if(across, 5)),
        RuleId::TwoOfThreeTwoS => Box::new(WindowRule::two_of_three_2s()),
        RuleId::ThreeOneS => Box::new(WindowRule::three_1s()),
        RuleId::NineX => Box::new(WindowRule::nine_x().across_runs_if(across, 3)),
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn layout_groups_lanes_and_events() {
        let points = paired(&[(0.5, -0.5), (1.0, 1.5)]);
        let layout = SeriesLayout::new(&points);
        assert_eq!(layout.level_count(), 2);
        assert_eq!(layout.lanes(), &[vec![0, 2], vec![1, 3]]);
        assert_eq!(layout.events(), &[vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn factory_builds_every_rule_with_its_id() {
        for id in RuleId::ALL {
            let rule = create_rule(id, EvaluatorOptions::default());
            assert_eq!(rule.id(), id);
            assert!(rule.window() >= 1);
        }
    }

    #[test]
    fn windows_match_rule_names() {
        let opts = EvaluatorOptions::default();
        assert_eq!(create_rule(RuleId::OneThreeS, opts).window(), 1);
        assert_eq!(create_rule(RuleId::TwoTwoS, opts).window(), 2);
        assert_eq!(create_rule(RuleId::FourOneS, opts).window(), 4);
        assert_eq!(create_rule(RuleId::TenX, opts).window(), 10);
        assert_eq!(create_rule(RuleId::NineX, opts).window(), 9);
    }
}
