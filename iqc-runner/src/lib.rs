//! IQC Runner — configuration, run loading, batch evaluation, caching, export.
//!
//! This crate builds on `iqc-core` to provide:
//! - TOML evaluation config (analytes, levels, baselines, sigma)
//! - CSV control-run loading with dataset fingerprinting
//! - Per-analyte evaluation and rayon-parallel batches
//! - Content-addressed evaluation cache
//! - JSON/CSV/Markdown artifact export

pub mod cache;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod report;
pub mod runner;

pub use cache::EvaluationCache;
pub use config::{AnalyteConfig, ConfigError, EvaluationConfig, EvaluationOptions, LevelConfig};
pub use data_loader::{load_runs_csv, read_runs, LoadError, LoadedRuns};
pub use export::{export_with_report, save_artifacts, ArtifactPaths};
pub use report::MarkdownReport;
pub use runner::{
    evaluation_id, AnalyteEvaluation, AnalyteFailure, BatchResult, RunError, Runner,
    SCHEMA_VERSION,
};
