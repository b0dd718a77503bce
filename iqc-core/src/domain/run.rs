//! ControlRun — one measurement of a control material.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::{AnalyteId, LevelId, RunId};

/// Raw value as entered. Text that does not parse as a number is kept
/// verbatim so it can be reported back instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Parse free text. Blank input means "no value" and yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.parse::<f64>() {
            Ok(v) => Self::Number(v),
            Err(_) => Self::Text(trimmed.to_string()),
        })
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

/// Whether a run takes part in evaluation.
///
/// Deleted or out-of-range runs stay in the sequence as `Excluded` so they
/// still break consecutive-point chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Active,
    #[serde(alias = "deleted")]
    Excluded,
}

/// A single control measurement. Append-only: never edited after creation.
///
/// Runs of different levels that share a timestamp belong to the same run
/// event (the levels measured together), which is what R_4s and the
/// across-level 2_2s pair on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRun {
    pub id: RunId,
    pub timestamp: NaiveDateTime,
    pub analyte_id: AnalyteId,
    pub level_id: LevelId,
    pub raw_value: Option<RawValue>,
    #[serde(default)]
    pub state: RunState,
}

impl ControlRun {
    pub fn new(
        id: impl Into<RunId>,
        timestamp: NaiveDateTime,
        analyte_id: AnalyteId,
        level_id: LevelId,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            analyte_id,
            level_id,
            raw_value: Some(RawValue::Number(value)),
            state: RunState::Active,
        }
    }

    /// Mark the run as excluded, keeping its slot in the sequence.
    pub fn excluded(mut self) -> Self {
        self.state = RunState::Excluded;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state == RunState::Active
    }
}
