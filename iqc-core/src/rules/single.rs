//! Single-point limit rules: 1_2s (warning) and 1_3s (reject).

use crate::domain::{RuleId, Violation};

use super::{SeriesLayout, WestgardRule};

/// Fires on any point with |z| strictly above `limit`.
#[derive(Debug, Clone)]
pub struct SinglePointRule {
    id: RuleId,
    limit: f64,
}

impl SinglePointRule {
    pub fn one_2s() -> Self {
        Self {
            id: RuleId::OneTwoS,
            limit: 2.0,
        }
    }

    pub fn one_3s() -> Self {
        Self {
            id: RuleId::OneThreeS,
            limit: 3.0,
        }
    }
}

impl WestgardRule for SinglePointRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn window(&self) -> usize {
        1
    }

    fn scan(&self, layout: &SeriesLayout<'_>) -> Vec<Violation> {
        layout
            .points()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.z.abs() > self.limit)
            .map(|(i, _)| Violation::new(self.id, vec![i]))
            .collect()
    }
}
