//! Control-run loading from CSV.
//!
//! Expected header: `run_id,timestamp,analyte,level,value,state`. `run_id`
//! and `state` may be left blank (or the columns omitted); a blank `run_id`
//! becomes `line-<n>` after its CSV line number. The `value` column
//! is free text so that entries like "hemolysed" survive as malformed values
//! instead of failing the whole file.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::warn;

use iqc_core::domain::{AnalyteId, ControlRun, LevelId, RawValue, RunId, RunState};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open runs file {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    run_id: Option<String>,
    timestamp: String,
    analyte: String,
    level: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// Runs grouped by analyte, in file order, plus a content hash.
#[derive(Debug, Clone, Default)]
pub struct LoadedRuns {
    pub runs: BTreeMap<AnalyteId, Vec<ControlRun>>,
    /// BLAKE3 over every loaded run, in analyte then file order.
    pub dataset_hash: String,
    /// Rows that could not be turned into a run, with the reason.
    pub skipped_rows: Vec<String>,
}

impl LoadedRuns {
    pub fn run_count(&self) -> usize {
        self.runs.values().map(Vec::len).sum()
    }

    pub fn runs_for(&self, analyte: &AnalyteId) -> &[ControlRun] {
        self.runs.get(analyte).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn load_runs_csv(path: impl AsRef<Path>) -> Result<LoadedRuns, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_runs(file)
}

/// Parse runs from any CSV source.
///
/// Rows with an unparseable timestamp or state, a blank analyte or level, or
/// a duplicate run id are skipped with a warning and listed in
/// `skipped_rows`. Structural CSV errors fail the load.
pub fn read_runs<R: io::Read>(reader: R) -> Result<LoadedRuns, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut loaded = LoadedRuns::default();
    let mut seen_ids: BTreeSet<RunId> = BTreeSet::new();

    for (index, row) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = row?;
        match parse_row(row, line) {
            Ok(run) => {
                if !seen_ids.insert(run.id.clone()) {
                    skip(&mut loaded, line, format!("duplicate run id {}", run.id));
                    continue;
                }
                loaded.runs.entry(run.analyte_id.clone()).or_default().push(run);
            }
            Err(reason) => skip(&mut loaded, line, reason),
        }
    }

    loaded.dataset_hash = compute_dataset_hash(&loaded.runs);
    Ok(loaded)
}

fn skip(loaded: &mut LoadedRuns, line: usize, reason: String) {
    warn!(line, "skipping CSV row: {reason}");
    loaded.skipped_rows.push(format!("line {line}: {reason}"));
}

fn parse_row(row: CsvRow, line: usize) -> Result<ControlRun, String> {
    if row.analyte.is_empty() {
        return Err("missing analyte".to_string());
    }
    if row.level.is_empty() {
        return Err("missing level".to_string());
    }
    let timestamp = parse_timestamp(&row.timestamp)
        .ok_or_else(|| format!("invalid timestamp {:?}", row.timestamp))?;
    let state = match row.state.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("active") => RunState::Active,
        Some("excluded") | Some("deleted") => RunState::Excluded,
        Some(other) => return Err(format!("invalid state {other:?}")),
    };
    let id = match row.run_id.filter(|id| !id.is_empty()) {
        Some(id) => RunId::new(id),
        None => RunId::new(format!("line-{line}")),
    };

    Ok(ControlRun {
        id,
        timestamp,
        analyte_id: AnalyteId::new(row.analyte),
        level_id: LevelId::new(row.level),
        raw_value: row.value.as_deref().and_then(RawValue::parse),
        state,
    })
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM`, `YYYY-MM-DD HH:MM:SS` and the
/// same with a `T` separator. Date-only values map to midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn compute_dataset_hash(runs: &BTreeMap<AnalyteId, Vec<ControlRun>>) -> String {
    let mut hasher = blake3::Hasher::new();

    for (analyte, analyte_runs) in runs {
        hasher.update(analyte.as_str().as_bytes());
        for run in analyte_runs {
            hasher.update(run.id.0.as_bytes());
            hasher.update(run.timestamp.to_string().as_bytes());
            hasher.update(run.level_id.as_str().as_bytes());
            match &run.raw_value {
                Some(RawValue::Number(v)) => hasher.update(&v.to_le_bytes()),
                Some(RawValue::Text(t)) => hasher.update(t.as_bytes()),
                None => hasher.update(b"-"),
            };
            hasher.update(&[u8::from(run.is_active())]);
        }
    }

    hasher.finalize().to_hex().to_string()
}
