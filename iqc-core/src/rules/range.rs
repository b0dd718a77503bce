//! R_4s — range between the levels of one run event.

use crate::domain::{RuleId, Violation};

use super::{SeriesLayout, WestgardRule};

/// Fires when two different levels of one run event straddle the mean:
/// one at or above +2 SD and the other at or below -2 SD, or a spread
/// strictly greater than `limit` (4 SD). Replicates of one level are never
/// paired with each other.
#[derive(Debug, Clone)]
pub struct RangeRule {
    limit: f64,
    side_limit: f64,
}

impl RangeRule {
    pub fn r_4s() -> Self {
        Self {
            limit: 4.0,
            side_limit: 2.0,
        }
    }

    fn fires(&self, hi: f64, lo: f64) -> bool {
        (hi >= self.side_limit && lo <= -self.side_limit) || hi - lo > self.limit
    }
}

impl WestgardRule for RangeRule {
    fn id(&self) -> RuleId {
        RuleId::RangeFourS
    }

    fn window(&self) -> usize {
        2
    }

    fn scan(&self, layout: &SeriesLayout<'_>) -> Vec<Violation> {
        let points = layout.points();
        let mut violations = Vec::new();

        for event in layout.events() {
            let finite: Vec<usize> = event
                .iter()
                .copied()
                .filter(|&i| points[i].z.is_finite())
                .collect();

            // Widest qualifying pair of distinct levels, as (hi, lo).
            let mut best: Option<(usize, usize)> = None;
            for (n, &a) in finite.iter().enumerate() {
                for &b in &finite[n + 1..] {
                    if points[a].level_id == points[b].level_id {
                        continue;
                    }
                    let (hi, lo) = if points[a].z >= points[b].z { (a, b) } else { (b, a) };
                    if !self.fires(points[hi].z, points[lo].z) {
                        continue;
                    }
                    let spread = points[hi].z - points[lo].z;
                    let wider = best.map_or(true, |(h, l)| spread > points[h].z - points[l].z);
                    if wider {
                        best = Some((hi, lo));
                    }
                }
            }

            if let Some((hi, lo)) = best {
                violations.push(Violation::new(self.id(), vec![hi, lo]));
            }
        }
        violations
    }
}
