//! Domain types for the IQC engine.

pub mod ids;
pub mod params;
pub mod point;
pub mod run;
pub mod violation;

pub use ids::{AnalyteId, LevelId, RunId};
pub use params::{SdBasis, StatParams};
pub use point::ZScorePoint;
pub use run::{ControlRun, RawValue, RunState};
pub use violation::{RuleId, Severity, UnknownRule, Violation};
