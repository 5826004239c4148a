//! Crate-wide error type.
//!
//! Every public operation returns `Result<T, AnalysisError>`. The variants mirror
//! the failure modes callers are expected to branch on (skip a panel, render a
//! placeholder, abort a figure); use [`AnalysisError::kind`] for that instead of
//! matching on payloads.

use thiserror::Error;

/// Payload-free discriminant of [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientData,
    DegenerateInput,
    ConvergenceFailure,
    InvalidGrouping,
    SingularFit,
    LengthMismatch,
    NonFiniteInput,
    InvalidConfig,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Fewer observations than the model has parameters.
    #[error("insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The independent variable carries no information (e.g. constant x).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// The least-squares solver exhausted its budget or could not make progress.
    #[error("fit did not converge after {evaluations} evaluations: {reason}")]
    ConvergenceFailure { evaluations: usize, reason: String },

    /// A field of view appears under more than one mouse.
    #[error(
        "invalid grouping: field of view '{field_of_view}' is recorded under mice '{first_mouse}' and '{second_mouse}'"
    )]
    InvalidGrouping {
        field_of_view: String,
        first_mouse: String,
        second_mouse: String,
    },

    /// The model design cannot identify the requested effects.
    #[error("singular fit: {0}")]
    SingularFit(String),

    #[error("length mismatch: {what} has {got} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("non-finite input: {0}")]
    NonFiniteInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InsufficientData { .. } => ErrorKind::InsufficientData,
            AnalysisError::DegenerateInput(_) => ErrorKind::DegenerateInput,
            AnalysisError::ConvergenceFailure { .. } => ErrorKind::ConvergenceFailure,
            AnalysisError::InvalidGrouping { .. } => ErrorKind::InvalidGrouping,
            AnalysisError::SingularFit(_) => ErrorKind::SingularFit,
            AnalysisError::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            AnalysisError::NonFiniteInput(_) => ErrorKind::NonFiniteInput,
            AnalysisError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = AnalysisError::InsufficientData { needed: 5, got: 3 };
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 5 points, got 3"
        );
    }

    #[test]
    fn grouping_message_names_both_mice() {
        let err = AnalysisError::InvalidGrouping {
            field_of_view: "fov1".into(),
            first_mouse: "m1".into(),
            second_mouse: "m2".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("fov1") && msg.contains("m1") && msg.contains("m2"));
    }
}
