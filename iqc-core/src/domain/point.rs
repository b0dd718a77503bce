use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::{LevelId, RunId};

/// A control run converted to a z-score. Derived, never stored on its own:
/// recomputed whenever the statistical parameters change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZScorePoint {
    pub run_id: RunId,
    pub timestamp: NaiveDateTime,
    pub level_id: LevelId,
    pub z: f64,
    /// Position of the run in its level's timeline, counting excluded and
    /// malformed runs. Two points are consecutive iff this differs by one.
    pub level_seq: usize,
    /// Ordinal of the run event (distinct timestamp) in the analyte timeline.
    pub event: usize,
}

impl ZScorePoint {
    /// +1 above the mean, -1 below, 0 exactly on it (or NaN).
    pub fn side(&self) -> i8 {
        if self.z > 0.0 {
            1
        } else if self.z < 0.0 {
            -1
        } else {
            0
        }
    }

    /// True when `next` directly follows `self` in the same level.
    pub fn is_followed_by(&self, next: &ZScorePoint) -> bool {
        self.level_id == next.level_id && next.level_seq == self.level_seq + 1
    }
}
