//! Markdown QC report for one analyte.

use iqc_core::verdict::QcStatus;

use crate::runner::{AnalyteEvaluation, BatchResult};

pub struct MarkdownReport;

impl MarkdownReport {
    pub fn generate(&self, evaluation: &AnalyteEvaluation) -> String {
        let mut md = String::with_capacity(2048);

        md.push_str(&format!("# IQC Report: {}\n\n", evaluation.name));

        md.push_str("## Summary\n\n");
        md.push_str("| Field | Value |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| Analyte | {} |\n", evaluation.analyte_id));
        if let Some(unit) = &evaluation.unit {
            md.push_str(&format!("| Unit | {unit} |\n"));
        }
        md.push_str(&format!(
            "| Sigma | {:.2} ({}) |\n",
            evaluation.sigma, evaluation.tier
        ));
        let rules: Vec<&str> = evaluation.active_rules.iter().map(|r| r.code()).collect();
        md.push_str(&format!("| Active rules | {} |\n", rules.join(", ")));
        md.push_str(&format!(
            "| Runs | {} ({} excluded, {} malformed) |\n",
            evaluation.run_count,
            evaluation.excluded_count,
            evaluation.malformed.len()
        ));
        md.push_str(&format!("| Status | **{}** |\n", evaluation.status()));
        md.push_str(&format!("| Evaluation ID | `{}` |\n", evaluation.evaluation_id));
        md.push('\n');

        md.push_str("## Run Status\n\n");
        md.push_str(&format!(
            "- Accepted: {}\n- Warning: {}\n- Rejected: {}\n",
            evaluation.count_with_status(QcStatus::Accepted),
            evaluation.count_with_status(QcStatus::Warning),
            evaluation.count_with_status(QcStatus::Rejected),
        ));

        let flagged: Vec<_> = evaluation
            .verdicts
            .iter()
            .filter(|v| v.status != QcStatus::Accepted)
            .collect();
        if !flagged.is_empty() {
            md.push_str("\n## Flagged Runs\n\n");
            md.push_str("| Timestamp | Status | Rules | Details |\n");
            md.push_str("| --- | --- | --- | --- |\n");
            for verdict in flagged {
                let rules: Vec<&str> = verdict.rules.iter().map(|r| r.code()).collect();
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    verdict.timestamp,
                    verdict.status,
                    rules.join(", "),
                    verdict.messages.join("; ")
                ));
            }
        }

        if !evaluation.malformed.is_empty() {
            md.push_str("\n## Malformed Runs\n\n");
            for message in &evaluation.malformed {
                md.push_str(&format!("- {message}\n"));
            }
        }

        md
    }

    /// One-table overview of a batch.
    pub fn generate_batch(&self, batch: &BatchResult) -> String {
        let mut md = String::from("# IQC Batch Summary\n\n");
        md.push_str(&format!("Dataset hash: `{}`\n\n", batch.dataset_hash));

        md.push_str("| Analyte | Tier | Points | Violations | Status |\n");
        md.push_str("| --- | --- | --- | --- | --- |\n");
        for evaluation in &batch.evaluations {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                evaluation.name,
                evaluation.tier,
                evaluation.points.len(),
                evaluation.violations.len(),
                evaluation.status()
            ));
        }

        if !batch.failures.is_empty() {
            md.push_str("\n## Failures\n\n");
            for failure in &batch.failures {
                md.push_str(&format!("- {}: {}\n", failure.analyte_id, failure.error));
            }
        }
        if !batch.unknown_analytes.is_empty() {
            let ids: Vec<&str> = batch.unknown_analytes.iter().map(|a| a.as_str()).collect();
            md.push_str(&format!("\nUnknown analytes in runs: {}\n", ids.join(", ")));
        }
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::tests::sample_evaluation;
    use crate::runner::AnalyteFailure;
    use iqc_core::domain::AnalyteId;

    #[test]
    fn report_has_summary_and_flagged_runs() {
        let report = MarkdownReport.generate(&sample_evaluation());
        assert!(report.starts_with("# IQC Report: Glucose"));
        assert!(report.contains("| Unit | mmol/L |"));
        assert!(report.contains("| Sigma | 4.50 (4σ) |"));
        assert!(report.contains("| Active rules | 1_3s, 2_2s, R_4s |"));
        assert!(report.contains("| Status | **rejected** |"));
        assert!(report.contains("- Rejected: 2"));
        assert!(report.contains("## Flagged Runs"));
        assert!(report.contains("## Malformed Runs"));
    }

    #[test]
    fn clean_analyte_has_no_flagged_section() {
        let mut evaluation = sample_evaluation();
        evaluation.verdicts.retain(|v| v.status == QcStatus::Accepted);
        evaluation.malformed.clear();
        let report = MarkdownReport.generate(&evaluation);
        assert!(report.contains("| Status | **accepted** |"));
        assert!(!report.contains("## Flagged Runs"));
        assert!(!report.contains("## Malformed Runs"));
    }

    #[test]
    fn batch_summary_lists_failures() {
        let batch = BatchResult {
            dataset_hash: "abc".into(),
            evaluations: vec![sample_evaluation()],
            failures: vec![AnalyteFailure {
                analyte_id: AnalyteId::new("alt"),
                error: "invalid parameter `sd`".into(),
            }],
            unknown_analytes: vec![AnalyteId::new("hba1c")],
            without_runs: vec![],
        };
        let md = MarkdownReport.generate_batch(&batch);
        assert!(md.contains("| Glucose | 4σ | 5 | 3 | rejected |"));
        assert!(md.contains("- alt: invalid parameter `sd`"));
        assert!(md.contains("Unknown analytes in runs: hba1c"));
    }
}
