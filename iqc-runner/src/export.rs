//! Export of evaluations: JSON, CSV logbooks, chart data and artifact bundles.
//!
//! Persisted JSON carries a `schema_version` field. Newer versions than this
//! build understands are rejected on load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use iqc_core::verdict::QcStatus;

use crate::report::MarkdownReport;
use crate::runner::{AnalyteEvaluation, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(evaluation: &AnalyteEvaluation) -> Result<String> {
    serde_json::to_string_pretty(evaluation).context("failed to serialize evaluation to JSON")
}

/// Deserialize an evaluation, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AnalyteEvaluation> {
    let evaluation: AnalyteEvaluation =
        serde_json::from_str(json).context("failed to deserialize evaluation from JSON")?;
    if evaluation.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            evaluation.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(evaluation)
}

/// Levey-Jennings chart data (series, control lines, markers) as JSON.
pub fn export_chart_json(evaluation: &AnalyteEvaluation) -> Result<String> {
    serde_json::to_string_pretty(&evaluation.chart()).context("failed to serialize chart")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// QC logbook, one row per scored point.
///
/// Columns: timestamp, run_id, level, z, status, rules
pub fn export_points_csv(evaluation: &AnalyteEvaluation) -> Result<String> {
    let markers: BTreeMap<usize, _> = evaluation
        .markers
        .iter()
        .map(|m| (m.point_index, m))
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "run_id", "level", "z", "status", "rules"])?;

    for (index, point) in evaluation.points.iter().enumerate() {
        let (status, rules) = match markers.get(&index) {
            Some(marker) => (
                QcStatus::from_severity(marker.severity),
                marker
                    .rules
                    .iter()
                    .map(|r| r.code())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            None => (QcStatus::Accepted, String::new()),
        };
        wtr.write_record([
            &point.timestamp.to_string(),
            &point.run_id.to_string(),
            point.level_id.as_str(),
            &format!("{:.3}", point.z),
            status.label(),
            &rules,
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Run verdicts, one row per run event.
///
/// Columns: event, timestamp, run_ids, levels, status, rules, messages
pub fn export_verdicts_csv(evaluation: &AnalyteEvaluation) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "event",
        "timestamp",
        "run_ids",
        "levels",
        "status",
        "rules",
        "messages",
    ])?;

    for verdict in &evaluation.verdicts {
        let run_ids: Vec<String> = verdict.run_ids.iter().map(ToString::to_string).collect();
        let levels: Vec<&str> = verdict.levels.iter().map(|l| l.as_str()).collect();
        let rules: Vec<&str> = verdict.rules.iter().map(|r| r.code()).collect();
        wtr.write_record([
            &verdict.event.to_string(),
            &verdict.timestamp.to_string(),
            &run_ids.join(" "),
            &levels.join(" "),
            verdict.status.label(),
            &rules.join(" "),
            &verdict.messages.join("; "),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Paths written by [`save_artifacts`].
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub evaluation_json: PathBuf,
    pub points_csv: PathBuf,
    pub runs_csv: PathBuf,
    pub chart_json: PathBuf,
    pub report_markdown: Option<PathBuf>,
}

/// Save the full artifact set, report included, under `<output_dir>/<analyte_id>/`.
pub fn save_artifacts(output_dir: &Path, evaluation: &AnalyteEvaluation) -> Result<ArtifactPaths> {
    export_with_report(output_dir, evaluation, true)
}

/// Save `evaluation.json`, `points.csv`, `runs.csv`, `chart.json` and,
/// when `include_report` is set, `report.md`.
pub fn export_with_report(
    output_dir: &Path,
    evaluation: &AnalyteEvaluation,
    include_report: bool,
) -> Result<ArtifactPaths> {
    let dir = output_dir.join(evaluation.analyte_id.as_str());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let evaluation_json = dir.join("evaluation.json");
    write(&evaluation_json, &export_json(evaluation)?)?;

    let points_csv = dir.join("points.csv");
    write(&points_csv, &export_points_csv(evaluation)?)?;

    let runs_csv = dir.join("runs.csv");
    write(&runs_csv, &export_verdicts_csv(evaluation)?)?;

    let chart_json = dir.join("chart.json");
    write(&chart_json, &export_chart_json(evaluation)?)?;

    let report_markdown = if include_report {
        let path = dir.join("report.md");
        write(&path, &MarkdownReport.generate(evaluation))?;
        Some(path)
    } else {
        None
    };

    Ok(ArtifactPaths {
        dir,
        evaluation_json,
        points_csv,
        runs_csv,
        chart_json,
        report_markdown,
    })
}

/// Load an evaluation back from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<AnalyteEvaluation> {
    let path = dir.join("evaluation.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
