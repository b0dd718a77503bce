//! Same-side window rules: 2_2s, 4_1s, 10x and their three-level variants.
//!
//! A window rule fires when `hits` of `span` consecutive points of one level
//! lie beyond `limit` on the same side of the mean. Some rules also look
//! across levels: within one run event (`same_run_levels`), or over a block
//! of consecutive run events covering every level (`block_runs`).

use std::collections::BTreeSet;

use crate::domain::{LevelId, RuleId, Violation};

use super::{SeriesLayout, WestgardRule};

const SIDES: [i8; 2] = [1, -1];

#[derive(Debug, Clone)]
pub struct WindowRule {
    id: RuleId,
    span: usize,
    hits: usize,
    limit: f64,
    /// Distinct levels of one run event that must exceed the limit together.
    same_run_levels: Option<usize>,
    /// Consecutive run events that, over all levels, must exceed the limit.
    block_runs: Option<usize>,
}

impl WindowRule {
    fn new(
        id: RuleId,
        span: usize,
        hits: usize,
        limit: f64,
        same_run_levels: Option<usize>,
    ) -> Self {
        Self {
            id,
            span,
            hits,
            limit,
            same_run_levels,
            block_runs: None,
        }
    }

    pub fn two_2s() -> Self {
        Self::new(RuleId::TwoTwoS, 2, 2, 2.0, Some(2))
    }

    pub fn four_1s() -> Self {
        Self::new(RuleId::FourOneS, 4, 4, 1.0, None)
    }

    pub fn ten_x() -> Self {
        Self::new(RuleId::TenX, 10, 10, 0.0, None)
    }

    pub fn two_of_three_2s() -> Self {
        Self::new(RuleId::TwoOfThreeTwoS, 3, 2, 2.0, Some(2))
    }

    pub fn three_1s() -> Self {
        Self::new(RuleId::ThreeOneS, 3, 3, 1.0, Some(3))
    }

    pub fn nine_x() -> Self {
        Self::new(RuleId::NineX, 9, 9, 0.0, None)
    }

    /// Also scan blocks of `runs` consecutive run events across all levels.
    pub fn across_runs_if(mut self, enabled: bool, runs: usize) -> Self {
        if enabled {
            self.block_runs = Some(runs);
        }
        self
    }

    /// Indices from `candidates` strictly beyond the limit on `side`.
    fn same_side_hits(
        &self,
        layout: &SeriesLayout<'_>,
        candidates: &[usize],
        side: i8,
    ) -> Vec<usize> {
        let points = layout.points();
        candidates
            .iter()
            .copied()
            .filter(|&i| f64::from(side) * points[i].z > self.limit)
            .collect()
    }

    fn scan_lanes(&self, layout: &SeriesLayout<'_>, out: &mut Vec<Violation>) {
        let points = layout.points();
        for lane in layout.lanes() {
            for window in lane.windows(self.span) {
                let first = &points[window[0]];
                let last = &points[window[self.span - 1]];
                if last.level_seq - first.level_seq != self.span - 1 {
                    continue;
                }
                for side in SIDES {
                    let hits = self.same_side_hits(layout, window, side);
                    if hits.len() >= self.hits {
                        out.push(Violation::new(self.id, hits));
                    }
                }
            }
        }
    }

    fn scan_same_run(&self, layout: &SeriesLayout<'_>, levels: usize, out: &mut Vec<Violation>) {
        let points = layout.points();
        for event in layout.events() {
            for side in SIDES {
                let hits = self.same_side_hits(layout, event, side);
                let distinct: BTreeSet<&LevelId> =
                    hits.iter().map(|&i| &points[i].level_id).collect();
                if distinct.len() >= levels {
                    out.push(Violation::new(self.id, hits));
                }
            }
        }
    }

    fn scan_blocks(&self, layout: &SeriesLayout<'_>, runs: usize, out: &mut Vec<Violation>) {
        let levels = layout.level_count();
        if levels < 2 || runs == 0 {
            return;
        }
        let points = layout.points();
        let complete = |event: &Vec<usize>| {
            let distinct: BTreeSet<&LevelId> =
                event.iter().map(|&i| &points[i].level_id).collect();
            distinct.len() == levels
        };

        for block in layout.events().windows(runs) {
            let first = points[block[0][0]].event;
            let last = points[block[runs - 1][0]].event;
            if last - first != runs - 1 || !block.iter().all(|event| complete(event)) {
                continue;
            }
            let members: Vec<usize> = block.iter().flatten().copied().collect();
            for side in SIDES {
                if self.same_side_hits(layout, &members, side).len() == members.len() {
                    out.push(Violation::new(self.id, members.clone()));
                }
            }
        }
    }
}

impl WestgardRule for WindowRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn window(&self) -> usize {
        self.same_run_levels.map_or(self.span, |levels| levels.min(self.span))
    }

    fn scan(&self, layout: &SeriesLayout<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.scan_lanes(layout, &mut violations);
        if let Some(levels) = self.same_run_levels {
            self.scan_same_run(layout, levels, &mut violations);
        }
        if let Some(runs) = self.block_runs {
            self.scan_blocks(layout, runs, &mut violations);
        }
        violations
    }
}
