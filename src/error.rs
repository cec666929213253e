//! Error type shared by the compiler, the operators, and the executor.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::query::physical::Convention;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while compiling or driving a row pipeline.
///
/// Everything except [`PipelineError::Eval`], [`PipelineError::Cancelled`] and
/// [`PipelineError::Timeout`] is structural: it is detected while the plan is
/// compiled and aborts the whole compilation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An operator or one of its inputs is not lowered to the physical convention.
    #[error("{operator} requires {expected} convention (got {found})")]
    ConventionMismatch {
        /// Operator that rejected the node.
        operator: &'static str,
        /// Convention the operator requires.
        expected: Convention,
        /// Convention that was found.
        found: Convention,
    },
    /// A producer's row shape is not accepted by its consumer.
    #[error("{context}: consumer expects {expected} but producer declares {found}")]
    SchemaMismatch {
        /// Where the check happened.
        context: &'static str,
        /// Consumer schema.
        expected: String,
        /// Producer schema.
        found: String,
    },
    /// A late-bound continuation was bound a second time.
    #[error("continuation for {sink} is already bound")]
    AlreadyBound {
        /// Sink that was rebound.
        sink: &'static str,
    },
    /// A late-bound continuation was used before being bound.
    #[error("continuation for {sink} has not been bound")]
    Unbound {
        /// Sink that was used while unbound.
        sink: &'static str,
    },
    /// An expression references a column past the end of its input row.
    #[error("column #{index} out of range for row of arity {arity}")]
    ColumnOutOfRange {
        /// Referenced column ordinal.
        index: usize,
        /// Input arity.
        arity: usize,
    },
    /// An expression does not type-check against its input schema.
    #[error("type mismatch in {context}: {detail}")]
    TypeMismatch {
        /// Where the check happened.
        context: &'static str,
        /// What went wrong.
        detail: String,
    },
    /// A pluggable source or operator feature is not implemented.
    #[error("{feature} is not supported")]
    Unsupported {
        /// Name of the missing feature.
        feature: String,
    },
    /// A scan referenced a table name the registry does not know.
    #[error("unknown table '{name}'")]
    UnknownTable {
        /// Table name as written in the plan.
        name: String,
    },
    /// Invalid argument or setup request.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Data-level failure while evaluating an expression against a row.
    #[error("evaluation failed: {0}")]
    Eval(String),
    /// The caller tripped the cancellation token.
    #[error("query cancelled")]
    Cancelled,
    /// The executor's deadline expired.
    #[error("query exceeded timeout of {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },
    /// I/O failure while loading a plan document.
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    /// Malformed plan document.
    #[error("plan document: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Builds a [`PipelineError::SchemaMismatch`] from two displayable schemas.
    pub fn schema_mismatch(
        context: &'static str,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        PipelineError::SchemaMismatch {
            context,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Builds a [`PipelineError::TypeMismatch`].
    pub fn type_mismatch(context: &'static str, detail: impl Into<String>) -> Self {
        PipelineError::TypeMismatch {
            context,
            detail: detail.into(),
        }
    }

    /// Builds a [`PipelineError::Unsupported`].
    pub fn unsupported(feature: impl Into<String>) -> Self {
        PipelineError::Unsupported {
            feature: feature.into(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::ConventionMismatch { .. } => "ConventionMismatch",
            PipelineError::SchemaMismatch { .. } => "SchemaMismatch",
            PipelineError::AlreadyBound { .. } => "AlreadyBound",
            PipelineError::Unbound { .. } => "Unbound",
            PipelineError::ColumnOutOfRange { .. } => "ColumnOutOfRange",
            PipelineError::TypeMismatch { .. } => "TypeMismatch",
            PipelineError::Unsupported { .. } => "Unsupported",
            PipelineError::UnknownTable { .. } => "UnknownTable",
            PipelineError::Invalid(_) => "Invalid",
            PipelineError::Eval(_) => "Eval",
            PipelineError::Cancelled => "Cancelled",
            PipelineError::Timeout { .. } => "Timeout",
            PipelineError::Io(_) => "Io",
            PipelineError::Json(_) => "PlanDocument",
        }
    }

    /// True for errors detected while compiling, before any row flows.
    pub fn is_compile_time(&self) -> bool {
        !matches!(
            self,
            PipelineError::Eval(_) | PipelineError::Cancelled | PipelineError::Timeout { .. }
        )
    }
}

/// Formats an error together with its code, e.g. `[Unbound] continuation ...`.
pub struct PipelineErrorWithCode<'a>(pub &'a PipelineError);

impl fmt::Display for PipelineErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
