//! Per-run QC status: the accept/warn/reject call a technician acts on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{LevelId, RuleId, RunId, Severity, Violation, ZScorePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcStatus {
    Accepted,
    Warning,
    Rejected,
}

impl QcStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Warning => "warning",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Warning => Self::Warning,
            Severity::Reject => Self::Rejected,
        }
    }
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict for one run event (the levels measured at one timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunVerdict {
    pub event: usize,
    pub timestamp: NaiveDateTime,
    pub run_ids: Vec<RunId>,
    pub levels: Vec<LevelId>,
    pub status: QcStatus,
    pub rules: BTreeSet<RuleId>,
    /// One line per violation anchored in this event.
    pub messages: Vec<String>,
}

impl RunVerdict {
    pub fn is_rejected(&self) -> bool {
        self.status == QcStatus::Rejected
    }
}

/// Summarise violations into one verdict per run event, in event order.
///
/// A violation counts for the event of its anchor point, so a 10x that spans
/// ten days rejects only the day that completed it.
pub fn summarize_runs(points: &[ZScorePoint], violations: &[Violation]) -> Vec<RunVerdict> {
    let mut by_event: BTreeMap<usize, RunVerdict> = BTreeMap::new();
    for point in points {
        let verdict = by_event.entry(point.event).or_insert_with(|| RunVerdict {
            event: point.event,
            timestamp: point.timestamp,
            run_ids: Vec::new(),
            levels: Vec::new(),
            status: QcStatus::Accepted,
            rules: BTreeSet::new(),
            messages: Vec::new(),
        });
        verdict.run_ids.push(point.run_id.clone());
        verdict.levels.push(point.level_id.clone());
    }

    for violation in violations {
        let Some(anchor) = points.get(violation.point_index) else {
            continue;
        };
        if let Some(verdict) = by_event.get_mut(&anchor.event) {
            verdict.status = verdict
                .status
                .max(QcStatus::from_severity(violation.severity));
            verdict.rules.insert(violation.rule_id);
            verdict.messages.push(violation.describe(points));
        }
    }

    by_event.into_values().collect()
}
