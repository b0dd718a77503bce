//! Checked failures raised by the engine.

use crate::domain::RunId;

/// The only two failure kinds the engine raises.
///
/// Invalid parameters are never replaced by defaults and malformed runs are
/// never silently dropped: either would hide a real data-quality problem
/// behind a "no violation" result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QcError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("malformed value in run {run_id}: {reason}")]
    MalformedValue { run_id: RunId, reason: String },
}

impl QcError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }

    pub fn is_malformed_value(&self) -> bool {
        matches!(self, Self::MalformedValue { .. })
    }
}
