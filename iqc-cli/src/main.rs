//! IQC CLI — batch evaluation and rule lookup commands.
//!
//! Commands:
//! - `evaluate` — evaluate control runs from a CSV file against a TOML config
//! - `rules` — show the sigma tier and active Westgard rules for a sigma metric
//! - `zscore` — convert raw control values to z-scores

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use iqc_core::domain::StatParams;
use iqc_core::verdict::QcStatus;
use iqc_core::{active_rules_for, z, RuleScheme, SigmaTier};
use iqc_runner::{
    export_with_report, load_runs_csv, AnalyteEvaluation, BatchResult, EvaluationCache,
    EvaluationConfig, MarkdownReport, Runner,
};

#[derive(Parser)]
#[command(
    name = "iqc",
    about = "IQC CLI — sigma-scaled Westgard rule evaluation"
)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate control runs from a CSV file against a TOML config.
    Evaluate {
        /// Path to the TOML evaluation config.
        #[arg(long)]
        config: PathBuf,

        /// Path to the control run CSV file.
        #[arg(long)]
        runs: PathBuf,

        /// Output directory for artifacts. Defaults to ./results.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Reuse and store evaluations in this cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Skip writing report.md for each analyte.
        #[arg(long, default_value_t = false)]
        no_report: bool,
    },
    /// Show the sigma tier and active rules for a sigma metric.
    Rules {
        /// Sigma metric of the measurement procedure.
        #[arg(long, allow_negative_numbers = true)]
        sigma: f64,

        /// Number of control levels run together (3 selects the 3-level family).
        #[arg(long, default_value_t = 2)]
        levels: usize,
    },
    /// Convert raw control values to z-scores.
    Zscore {
        /// Target mean of the control material.
        #[arg(long, allow_negative_numbers = true)]
        mean: f64,

        /// Standard deviation of the control material.
        #[arg(long, allow_negative_numbers = true)]
        sd: f64,

        /// Raw control values.
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Evaluate {
            config,
            runs,
            output_dir,
            cache_dir,
            no_report,
        } => run_evaluate(&config, &runs, &output_dir, cache_dir.as_deref(), no_report),
        Commands::Rules { sigma, levels } => run_rules(sigma, levels),
        Commands::Zscore { mean, sd, values } => run_zscore(mean, sd, &values),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run_evaluate(
    config_path: &Path,
    runs_path: &Path,
    output_dir: &Path,
    cache_dir: Option<&Path>,
    no_report: bool,
) -> Result<()> {
    let config = EvaluationConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let loaded = load_runs_csv(runs_path)
        .with_context(|| format!("failed to load runs {}", runs_path.display()))?;

    if loaded.run_count() == 0 {
        bail!("no control runs found in {}", runs_path.display());
    }
    for skipped in &loaded.skipped_rows {
        eprintln!("Skipped {skipped}");
    }

    let runner = match cache_dir {
        Some(dir) => Runner::with_cache(EvaluationCache::new(dir)?),
        None => Runner::new(),
    };
    let batch = runner.evaluate_all(&config, &loaded);

    for evaluation in &batch.evaluations {
        print_summary(evaluation);
        let paths = export_with_report(output_dir, evaluation, !no_report)?;
        println!("Artifacts saved to: {}", paths.dir.display());
    }
    print_batch_notes(&batch);

    if !no_report && !batch.evaluations.is_empty() {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
        let summary_path = output_dir.join("summary.md");
        std::fs::write(&summary_path, MarkdownReport.generate_batch(&batch))
            .with_context(|| format!("failed to write {}", summary_path.display()))?;
    }

    if batch.has_failures() {
        for failure in &batch.failures {
            eprintln!("Error for {}: {}", failure.analyte_id, failure.error);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_rules(sigma: f64, levels: usize) -> Result<()> {
    let tier = SigmaTier::from_sigma(sigma)?;
    let scheme = RuleScheme::for_level_count(levels);
    let rules = active_rules_for(sigma, scheme)?;

    println!("Sigma:  {sigma:.2} ({tier})");
    println!("Scheme: {}", scheme_label(scheme));
    println!("Rules:  {}", join_codes(rules.iter().map(|r| r.code())));
    Ok(())
}

fn run_zscore(mean: f64, sd: f64, values: &[f64]) -> Result<()> {
    let params = StatParams::new(mean, sd, 0.0, 0.0);
    for value in values {
        let score = z(*value, &params)?;
        println!("{value}\t{score:+.3}");
    }
    Ok(())
}

fn scheme_label(scheme: RuleScheme) -> &'static str {
    match scheme {
        RuleScheme::TwoLevel => "2 levels (2_2s, 4_1s, 10x)",
        RuleScheme::ThreeLevel => "3 levels (2of3_2s, 3_1s, 9x)",
    }
}

fn join_codes<'a>(codes: impl Iterator<Item = &'a str>) -> String {
    let codes: Vec<&str> = codes.collect();
    if codes.is_empty() {
        "-".to_string()
    } else {
        codes.join(", ")
    }
}

fn print_summary(evaluation: &AnalyteEvaluation) {
    println!();
    println!("=== {} ===", evaluation.name);
    println!(
        "Sigma:          {:.2} ({})",
        evaluation.sigma, evaluation.tier
    );
    println!(
        "Rules:          {}",
        join_codes(evaluation.active_rules.iter().map(|r| r.code()))
    );
    println!(
        "Runs:           {} ({} excluded, {} malformed)",
        evaluation.run_count,
        evaluation.excluded_count,
        evaluation.malformed.len()
    );
    println!("Violations:     {}", evaluation.violations.len());
    println!(
        "Run events:     {} accepted, {} warning, {} rejected",
        evaluation.count_with_status(QcStatus::Accepted),
        evaluation.count_with_status(QcStatus::Warning),
        evaluation.count_with_status(QcStatus::Rejected)
    );
    println!("Status:         {}", evaluation.status());
    for verdict in evaluation.verdicts.iter().filter(|v| v.is_rejected()) {
        println!("REJECT {}: {}", verdict.timestamp, verdict.messages.join("; "));
    }
}

fn print_batch_notes(batch: &BatchResult) {
    if !batch.without_runs.is_empty() {
        println!();
        for analyte in &batch.without_runs {
            println!("NOTE: no runs for configured analyte {analyte}");
        }
    }
    for analyte in &batch.unknown_analytes {
        println!("WARNING: runs for unconfigured analyte {analyte} were ignored");
    }
}
