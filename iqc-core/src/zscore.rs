//! Z-score conversion.
//!
//! `z` is the pure formula. `score_runs` turns an analyte's run sequence into
//! ordered [`ZScorePoint`]s, assigning the per-level and per-event ordinals
//! the rule windows rely on.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::domain::{ControlRun, LevelId, RawValue, StatParams, ZScorePoint};
use crate::error::QcError;

/// z = (raw - mean) / sd.
///
/// Fails with `InvalidParameter` when `sd` is not a positive finite number.
/// NaN or infinite `raw` values propagate into the result.
pub fn z(raw: f64, params: &StatParams) -> Result<f64, QcError> {
    if !(params.sd.is_finite() && params.sd > 0.0) {
        return Err(QcError::invalid(
            "sd",
            format!("must be a positive finite number, got {}", params.sd),
        ));
    }
    Ok((raw - params.mean) / params.sd)
}

/// Result of scoring one analyte's runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredSeries {
    /// Points ordered by (timestamp, level).
    pub points: Vec<ZScorePoint>,
    /// One `MalformedValue` per run whose value could not be scored.
    pub malformed: Vec<QcError>,
    /// Number of runs skipped because they were excluded.
    pub excluded: usize,
}

/// Score a run sequence against per-level parameters.
///
/// Runs are stable-sorted by (timestamp, level). Excluded and malformed runs
/// yield no point but still consume their level slot, so they break
/// consecutive-point chains. Fails if an active run's level has no
/// parameters or its parameters are invalid.
pub fn score_runs(
    runs: &[ControlRun],
    params: &BTreeMap<LevelId, StatParams>,
) -> Result<ScoredSeries, QcError> {
    let mut ordered: Vec<&ControlRun> = runs.iter().collect();
    ordered.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.level_id.cmp(&b.level_id))
    });

    let mut series = ScoredSeries::default();
    let mut next_seq: BTreeMap<&LevelId, usize> = BTreeMap::new();
    let mut event = 0usize;
    let mut last_timestamp: Option<NaiveDateTime> = None;

    for run in ordered {
        if let Some(ts) = last_timestamp {
            if ts != run.timestamp {
                event += 1;
            }
        }
        last_timestamp = Some(run.timestamp);

        let slot = next_seq.entry(&run.level_id).or_insert(0);
        let level_seq = *slot;
        *slot += 1;

        if !run.is_active() {
            series.excluded += 1;
            continue;
        }

        let raw = match numeric_value(run) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(run = %run.id, level = %run.level_id, "{err}");
                series.malformed.push(err);
                continue;
            }
        };

        let level_params = params.get(&run.level_id).ok_or_else(|| {
            QcError::invalid(
                "level",
                format!("no statistical parameters for level {}", run.level_id),
            )
        })?;

        series.points.push(ZScorePoint {
            run_id: run.id.clone(),
            timestamp: run.timestamp,
            level_id: run.level_id.clone(),
            z: z(raw, level_params)?,
            level_seq,
            event,
        });
    }

    Ok(series)
}

fn numeric_value(run: &ControlRun) -> Result<f64, QcError> {
    let reason = match &run.raw_value {
        None => "missing value".to_string(),
        Some(RawValue::Text(text)) => format!("not a number: {text:?}"),
        Some(RawValue::Number(v)) if !v.is_finite() => format!("not a finite number: {v}"),
        Some(RawValue::Number(v)) => return Ok(*v),
    };
    Err(QcError::MalformedValue {
        run_id: run.id.clone(),
        reason,
    })
}
