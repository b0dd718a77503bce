//! Sigma-metric scaling of the active rule set.
//!
//! A continuous sigma metric is discretised into a [`SigmaTier`], and each
//! tier owns a fixed rule table. Low-sigma procedures run more rules to catch
//! drift; high-sigma procedures run leaner sets to avoid false rejection.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::RuleId;
use crate::error::QcError;

/// Set of rule ids, iterated in `RuleId` order.
pub type RuleSet = BTreeSet<RuleId>;

/// Discrete sigma band. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaTier {
    /// σ < 3
    BelowThree,
    /// 3 ≤ σ < 4
    Three,
    /// 4 ≤ σ < 5
    Four,
    /// 5 ≤ σ < 6
    Five,
    /// σ ≥ 6
    Six,
}

const SIX_SIGMA_RULES: &[RuleId] = &[RuleId::OneThreeS];
const FIVE_SIGMA_RULES: &[RuleId] = &[RuleId::OneThreeS, RuleId::TwoTwoS];
const FOUR_SIGMA_RULES: &[RuleId] = &[RuleId::OneThreeS, RuleId::TwoTwoS, RuleId::RangeFourS];
const THREE_SIGMA_RULES: &[RuleId] = &[
    RuleId::OneThreeS,
    RuleId::TwoTwoS,
    RuleId::RangeFourS,
    RuleId::FourOneS,
];
const BELOW_THREE_SIGMA_RULES: &[RuleId] = &[
    RuleId::OneTwoS,
    RuleId::OneThreeS,
    RuleId::TwoTwoS,
    RuleId::RangeFourS,
    RuleId::FourOneS,
    RuleId::TenX,
];

impl SigmaTier {
    /// Discretise a sigma metric. Fails for negative or NaN sigma.
    pub fn from_sigma(sigma: f64) -> Result<Self, QcError> {
        if sigma.is_nan() || sigma < 0.0 {
            return Err(QcError::invalid(
                "sigma",
                format!("must be a non-negative number, got {sigma}"),
            ));
        }
        Ok(if sigma >= 6.0 {
            Self::Six
        } else if sigma >= 5.0 {
            Self::Five
        } else if sigma >= 4.0 {
            Self::Four
        } else if sigma >= 3.0 {
            Self::Three
        } else {
            Self::BelowThree
        })
    }

    /// The two-level rule table for this tier.
    pub fn rules(&self) -> &'static [RuleId] {
        match self {
            Self::Six => SIX_SIGMA_RULES,
            Self::Five => FIVE_SIGMA_RULES,
            Self::Four => FOUR_SIGMA_RULES,
            Self::Three => THREE_SIGMA_RULES,
            Self::BelowThree => BELOW_THREE_SIGMA_RULES,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Six => "≥6σ",
            Self::Five => "5σ",
            Self::Four => "4σ",
            Self::Three => "3σ",
            Self::BelowThree => "<3σ",
        }
    }
}

impl fmt::Display for SigmaTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which rule family a protocol uses, decided by how many control levels
/// are run together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScheme {
    /// Classic multirule: 2_2s, 4_1s, 10x.
    #[default]
    TwoLevel,
    /// Three-level equivalents: 2of3_2s, 3_1s, 9x.
    ThreeLevel,
}

impl RuleScheme {
    pub fn for_level_count(levels: usize) -> Self {
        if levels == 3 {
            Self::ThreeLevel
        } else {
            Self::TwoLevel
        }
    }

    fn map(&self, rule: RuleId) -> RuleId {
        match (self, rule) {
            (Self::ThreeLevel, RuleId::TwoTwoS) => RuleId::TwoOfThreeTwoS,
            (Self::ThreeLevel, RuleId::FourOneS) => RuleId::ThreeOneS,
            (Self::ThreeLevel, RuleId::TenX) => RuleId::NineX,
            _ => rule,
        }
    }
}

/// Active rules for a sigma metric under the two-level scheme.
pub fn active_rules(sigma: f64) -> Result<RuleSet, QcError> {
    active_rules_for(sigma, RuleScheme::TwoLevel)
}

/// Active rules for a sigma metric under the given scheme.
pub fn active_rules_for(sigma: f64, scheme: RuleScheme) -> Result<RuleSet, QcError> {
    let tier = SigmaTier::from_sigma(sigma)?;
    Ok(tier.rules().iter().map(|&rule| scheme.map(rule)).collect())
}
