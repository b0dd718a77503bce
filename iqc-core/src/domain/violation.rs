//! Rule identifiers, severities and the violation record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::point::ZScorePoint;

/// Westgard rule identifiers.
///
/// The first six are the classic two-level multirule; the last three are
/// the equivalents used when three control levels are run together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleId {
    #[serde(rename = "1_2s")]
    OneTwoS,
    #[serde(rename = "1_3s")]
    OneThreeS,
    #[serde(rename = "2_2s")]
    TwoTwoS,
    #[serde(rename = "R_4s")]
    RangeFourS,
    #[serde(rename = "4_1s")]
    FourOneS,
    #[serde(rename = "10x")]
    TenX,
    #[serde(rename = "2of3_2s")]
    TwoOfThreeTwoS,
    #[serde(rename = "3_1s")]
    ThreeOneS,
    #[serde(rename = "9x")]
    NineX,
}

impl RuleId {
    pub const ALL: [RuleId; 9] = [
        RuleId::OneTwoS,
        RuleId::OneThreeS,
        RuleId::TwoTwoS,
        RuleId::RangeFourS,
        RuleId::FourOneS,
        RuleId::TenX,
        RuleId::TwoOfThreeTwoS,
        RuleId::ThreeOneS,
        RuleId::NineX,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::OneTwoS => "1_2s",
            Self::OneThreeS => "1_3s",
            Self::TwoTwoS => "2_2s",
            Self::RangeFourS => "R_4s",
            Self::FourOneS => "4_1s",
            Self::TenX => "10x",
            Self::TwoOfThreeTwoS => "2of3_2s",
            Self::ThreeOneS => "3_1s",
            Self::NineX => "9x",
        }
    }

    /// 1_2s is the only warning rule; everything else rejects the run.
    pub fn severity(&self) -> Severity {
        match self {
            Self::OneTwoS => Severity::Warning,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when parsing an unknown rule code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown Westgard rule: {0}")]
pub struct UnknownRule(pub String);

impl FromStr for RuleId {
    type Err = UnknownRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RuleId::ALL
            .into_iter()
            .find(|rule| rule.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownRule(wanted.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// One rule firing on one point.
///
/// `point_index` and `contributing_points` index the point slice that was
/// evaluated. The violation anchors on the last contributing point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub point_index: usize,
    pub rule_id: RuleId,
    pub severity: Severity,
    pub contributing_points: Vec<usize>,
}

impl Violation {
    pub fn new(rule_id: RuleId, mut contributing_points: Vec<usize>) -> Self {
        contributing_points.sort_unstable();
        contributing_points.dedup();
        let point_index = contributing_points.last().copied().unwrap_or_default();
        Self {
            point_index,
            rule_id,
            severity: rule_id.severity(),
            contributing_points,
        }
    }

    /// Short human-readable description, e.g. `2_2s (L1 z=2.50, L1 z=2.60)`.
    pub fn describe(&self, points: &[ZScorePoint]) -> String {
        let parts: Vec<String> = self
            .contributing_points
            .iter()
            .filter_map(|&i| points.get(i))
            .map(|p| format!("{} z={:.2}", p.level_id, p.z))
            .collect();
        format!("{} ({})", self.rule_id, parts.join(", "))
    }
}
