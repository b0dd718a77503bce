//! Batch evaluation from files on disk: config + CSV in, artifacts out.

use std::path::Path;

use iqc_core::domain::{AnalyteId, RuleId};
use iqc_core::verdict::QcStatus;
use iqc_runner::{
    load_runs_csv, save_artifacts, EvaluationCache, EvaluationConfig, MarkdownReport, Runner,
};

const CONFIG: &str = r#"
[options]
cross_level_runs = true

[[analytes]]
id = "glucose"
name = "Glucose"
unit = "mmol/L"
sigma = 3.5

[[analytes.levels]]
id = "L1"
mean = 5.0
sd = 0.1
cv = 2.0

[[analytes.levels]]
id = "L2"
mean = 15.0
sd = 0.5
cv = 3.3

[[analytes]]
id = "sodium"
sigma = 6.2

[[analytes.levels]]
id = "N"
mean = 140.0
sd = 0.0

[[analytes]]
id = "potassium"
sigma = 5.0

[[analytes.levels]]
id = "N"
mean = 4.0
sd = 0.1
"#;

const RUNS: &str = "\
run_id,timestamp,analyte,level,value,state
g1,2024-05-01 08:00,glucose,L1,5.12,
g2,2024-05-01 08:00,glucose,L2,15.6,
g3,2024-05-02 08:00,glucose,L1,5.14,
g4,2024-05-02 08:00,glucose,L2,15.7,
g5,2024-05-03 08:00,glucose,L1,5.01,
g6,2024-05-03 08:00,glucose,L2,15.1,
s1,2024-05-01 09:00,sodium,N,141,
h1,2024-05-01 09:00,hba1c,L1,6.1,
";

fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let config_path = dir.join("iqc.toml");
    let runs_path = dir.join("runs.csv");
    std::fs::write(&config_path, CONFIG).unwrap();
    std::fs::write(&runs_path, RUNS).unwrap();
    (config_path, runs_path)
}

#[test]
fn batch_from_files() {
    // GIVEN: a config with three analytes and a run file covering two of them plus an unknown one
    let temp_dir = tempfile::tempdir().unwrap();
    let (config_path, runs_path) = write_inputs(temp_dir.path());
    let config = EvaluationConfig::from_file(&config_path).unwrap();
    let loaded = load_runs_csv(&runs_path).unwrap();

    // WHEN: evaluating everything
    let batch = Runner::new().evaluate_all(&config, &loaded);

    // THEN: glucose evaluates, sodium fails on its zero SD, potassium has no runs
    assert_eq!(batch.dataset_hash, loaded.dataset_hash);
    assert_eq!(batch.evaluations.len(), 1);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].analyte_id, AnalyteId::new("sodium"));
    assert!(batch.failures[0].error.contains("sd"));
    assert_eq!(batch.without_runs, vec![AnalyteId::new("potassium")]);
    assert_eq!(batch.unknown_analytes, vec![AnalyteId::new("hba1c")]);
    assert!(batch.has_failures());

    // AND: the cross-level 4_1s block fired on day 2
    let glucose = &batch.evaluations[0];
    assert!(glucose
        .violations
        .iter()
        .any(|v| v.rule_id == RuleId::FourOneS && v.point_index == 3));
    assert_eq!(glucose.verdicts[1].status, QcStatus::Rejected);
    assert_eq!(glucose.verdicts[2].status, QcStatus::Accepted);

    let summary = MarkdownReport.generate_batch(&batch);
    assert!(summary.contains("- sodium:"));
}

#[test]
fn cache_reuses_identical_evaluations() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (config_path, runs_path) = write_inputs(temp_dir.path());
    let config = EvaluationConfig::from_file(&config_path).unwrap();
    let loaded = load_runs_csv(&runs_path).unwrap();

    let cache = EvaluationCache::new(temp_dir.path().join("cache")).unwrap();
    let runner = Runner::with_cache(cache.clone());

    let first = runner.evaluate_all(&config, &loaded);
    assert_eq!(cache.len().unwrap(), 1);

    let second = runner.evaluate_all(&config, &loaded);
    assert_eq!(cache.len().unwrap(), 1);
    assert_eq!(
        first.evaluations[0].evaluation_id,
        second.evaluations[0].evaluation_id
    );
    assert_eq!(first.evaluations[0].violations, second.evaluations[0].violations);
}

#[test]
fn artifacts_land_per_analyte() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (config_path, runs_path) = write_inputs(temp_dir.path());
    let config = EvaluationConfig::from_file(&config_path).unwrap();
    let loaded = load_runs_csv(&runs_path).unwrap();
    let batch = Runner::new().evaluate_all(&config, &loaded);

    let out = temp_dir.path().join("results");
    for evaluation in &batch.evaluations {
        save_artifacts(&out, evaluation).unwrap();
    }

    let dir = out.join("glucose");
    for file in ["evaluation.json", "points.csv", "runs.csv", "chart.json", "report.md"] {
        assert!(dir.join(file).exists(), "missing {file}");
    }
    let report = std::fs::read_to_string(dir.join("report.md")).unwrap();
    assert!(report.contains("4_1s"));
}
