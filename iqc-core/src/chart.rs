//! Levey-Jennings chart data: violation markers, per-level series and
//! control lines.
//!
//! The chart plots z-scores, so the control lines sit at fixed SD multiples
//! regardless of the level's mean and SD. Points beyond ±3 SD are pinned to
//! the edge of the plot and flagged `off_scale`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{LevelId, RuleId, RunId, Severity, Violation, ZScorePoint};

/// Plot range of the chart in SD units.
pub const PLOT_LIMIT: f64 = 3.0;

fn clip(z: f64) -> f64 {
    if z.is_nan() {
        z
    } else {
        z.clamp(-PLOT_LIMIT, PLOT_LIMIT)
    }
}

/// One annotated (violating) point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMarker {
    pub point_index: usize,
    pub run_id: RunId,
    pub timestamp: NaiveDateTime,
    pub level_id: LevelId,
    pub z: f64,
    /// z clipped to the plot range.
    pub plot_z: f64,
    /// |z| lies beyond the plot range.
    pub off_scale: bool,
    pub rules: BTreeSet<RuleId>,
    /// Reject if any rule on the point rejects.
    pub severity: Severity,
}

/// Build one marker per point that carries at least one violation, in point
/// order. Violations pointing outside `points` are ignored.
pub fn annotate(points: &[ZScorePoint], violations: &[Violation]) -> Vec<ChartMarker> {
    let mut by_point: BTreeMap<usize, (BTreeSet<RuleId>, Severity)> = BTreeMap::new();
    for v in violations.iter().filter(|v| v.point_index < points.len()) {
        let entry = by_point
            .entry(v.point_index)
            .or_insert_with(|| (BTreeSet::new(), Severity::Warning));
        entry.0.insert(v.rule_id);
        entry.1 = entry.1.max(v.severity);
    }

    by_point
        .into_iter()
        .map(|(index, (rules, severity))| {
            let point = &points[index];
            ChartMarker {
                point_index: index,
                run_id: point.run_id.clone(),
                timestamp: point.timestamp,
                level_id: point.level_id.clone(),
                z: point.z,
                plot_z: clip(point.z),
                off_scale: point.z.abs() > PLOT_LIMIT,
                rules,
                severity,
            }
        })
        .collect()
}

/// A point as drawn on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub point_index: usize,
    pub run_id: RunId,
    pub timestamp: NaiveDateTime,
    pub z: f64,
    pub plot_z: f64,
    pub off_scale: bool,
}

/// All points of one control level, in time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSeries {
    pub level_id: LevelId,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Mean,
    OneSd,
    Warning,
    Action,
}

/// Horizontal reference line at `z` SD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLine {
    pub z: f64,
    pub label: String,
    pub kind: LineKind,
}

/// Lines at the mean, ±1 SD, ±2 SD (warning) and ±3 SD (action).
pub fn control_lines() -> Vec<ControlLine> {
    let mut lines = vec![ControlLine {
        z: 0.0,
        label: "mean".to_string(),
        kind: LineKind::Mean,
    }];
    let bands = [
        (1.0, LineKind::OneSd),
        (2.0, LineKind::Warning),
        (3.0, LineKind::Action),
    ];
    for (k, kind) in bands {
        for sign in [1.0, -1.0] {
            let z: f64 = sign * k;
            lines.push(ControlLine {
                z,
                label: format!("{z:+}SD"),
                kind,
            });
        }
    }
    lines
}

/// Everything a renderer needs for one analyte's Levey-Jennings chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeveyJenningsChart {
    pub series: Vec<LevelSeries>,
    pub control_lines: Vec<ControlLine>,
    pub markers: Vec<ChartMarker>,
}

impl LeveyJenningsChart {
    pub fn build(points: &[ZScorePoint], violations: &[Violation]) -> Self {
        let mut by_level: BTreeMap<&LevelId, Vec<ChartPoint>> = BTreeMap::new();
        for (index, point) in points.iter().enumerate() {
            by_level.entry(&point.level_id).or_default().push(ChartPoint {
                point_index: index,
                run_id: point.run_id.clone(),
                timestamp: point.timestamp,
                z: point.z,
                plot_z: clip(point.z),
                off_scale: point.z.abs() > PLOT_LIMIT,
            });
        }

        Self {
            series: by_level
                .into_iter()
                .map(|(level_id, points)| LevelSeries {
                    level_id: level_id.clone(),
                    points,
                })
                .collect(),
            control_lines: control_lines(),
            markers: annotate(points, violations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testutil::{lane, paired};

    #[test]
    fn one_marker_per_violating_point_with_merged_rules() {
        let points = lane(&[0.5, 2.5, 3.5]);
        let violations = vec![
            Violation::new(RuleId::OneTwoS, vec![1]),
            Violation::new(RuleId::OneTwoS, vec![2]),
            Violation::new(RuleId::OneThreeS, vec![2]),
            Violation::new(RuleId::TwoTwoS, vec![1, 2]),
        ];
        let markers = annotate(&points, &violations);
        assert_eq!(markers.len(), 2);

        assert_eq!(markers[0].point_index, 1);
        assert_eq!(markers[0].severity, Severity::Warning);
        assert!(!markers[0].off_scale);

        let last = &markers[1];
        assert_eq!(last.point_index, 2);
        assert_eq!(
            last.rules,
            BTreeSet::from([RuleId::OneTwoS, RuleId::OneThreeS, RuleId::TwoTwoS])
        );
        assert_eq!(last.severity, Severity::Reject);
        assert_eq!(last.plot_z, 3.0);
        assert!(last.off_scale);
    }

    #[test]
    fn no_violations_no_markers() {
        assert!(annotate(&lane(&[0.1, -0.2]), &[]).is_empty());
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let markers = annotate(&lane(&[3.5]), &[Violation::new(RuleId::OneThreeS, vec![4])]);
        assert!(markers.is_empty());
    }

    #[test]
    fn negative_points_clip_to_lower_edge() {
        let points = lane(&[-4.2]);
        let markers = annotate(&points, &[Violation::new(RuleId::OneThreeS, vec![0])]);
        assert_eq!(markers[0].plot_z, -3.0);
        assert_eq!(markers[0].z, -4.2);
    }

    #[test]
    fn chart_splits_series_per_level() {
        let points = paired(&[(0.5, -0.5), (1.0, 3.2)]);
        let violations = [Violation::new(RuleId::OneThreeS, vec![3])];
        let chart = LeveyJenningsChart::build(&points, &violations);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].level_id, LevelId::new("L1"));
        let l2: Vec<usize> = chart.series[1].points.iter().map(|p| p.point_index).collect();
        assert_eq!(l2, vec![1, 3]);
        assert!(chart.series[1].points[1].off_scale);
        assert_eq!(chart.markers.len(), 1);
    }

    #[test]
    fn control_lines_are_symmetric() {
        let lines = control_lines();
        assert_eq!(lines.len(), 7);
        let mut zs: Vec<f64> = lines.iter().map(|l| l.z).collect();
        zs.sort_by(f64::total_cmp);
        assert_eq!(zs, vec![-3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0]);
        assert!(lines
            .iter()
            .any(|l| l.z == -3.0 && l.kind == LineKind::Action));
    }
}
