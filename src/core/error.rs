use crate::core::institution::InstitutionId;
use crate::solver::SolverError;
use thiserror::Error;

/// Errors that abort a single evaluation.
///
/// An infeasible or undecided constraint system is not an error; those
/// come back as a [`Verdict`](crate::analysis::interpreter::Verdict).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid input for {subject}.{field}: {reason}")]
    InvalidInput {
        subject: String,
        field: String,
        reason: String,
    },
    #[error("exposure {from} -> {to} references undeclared institution '{missing}'")]
    UnknownReference {
        from: InstitutionId,
        to: InstitutionId,
        missing: InstitutionId,
    },
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
}

impl EngineError {
    pub fn invalid(
        subject: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EngineError::InvalidInput {
            subject: subject.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's data rather than the solver.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidInput { .. } | EngineError::UnknownReference { .. }
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::invalid("document", format!("line {}", e.line()), e.to_string())
    }
}
