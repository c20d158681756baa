//! Error types for the discretization core.
//!
//! Construction-time and lookup-time problems (unknown scheme names, missing
//! fields, inconsistent mesh sizes, dimension mismatches) are returned as
//! [`FvError`] values at the point where they are detected. Numerical-quality
//! issues are not errors: they are reported through solver performance
//! records and `log::warn!`.

use thiserror::Error;

use crate::types::DimensionSet;

/// Errors raised by the finite-volume core.
#[derive(Error, Debug)]
pub enum FvError {
    /// Binary operation between quantities of different physical dimensions.
    #[error("Dimension mismatch in '{operation}': lhs {lhs} vs rhs {rhs}")]
    DimensionMismatch {
        operation: String,
        lhs: DimensionSet,
        rhs: DimensionSet,
    },

    /// A runtime-selected type name is not registered.
    #[error("Unknown {kind} type '{name}'. Valid {kind} types are: {}", valid.join(", "))]
    UnknownType {
        kind: &'static str,
        name: String,
        valid: Vec<String>,
    },

    /// Registry or mesh lookup of a non-existent name.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Registry lookup found an object of a different type or rank.
    #[error("Object '{name}' has type {actual}, requested {expected}")]
    WrongType {
        name: String,
        expected: String,
        actual: String,
    },

    /// Sizes that must agree (field vs mesh, patch vs boundary field) do not.
    #[error("Size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Mesh topology is inconsistent.
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Invalid configuration entry.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Halo exchange or reduction failed.
    #[error("Communication error: {0}")]
    Communication(String),

    /// Matrix failed the diagonal-dominance check.
    #[error(
        "Matrix for '{field}' is not diagonally dominant: {violations} rows violate dominance (worst ratio {worst_ratio:.3e})"
    )]
    DiagonalDominance {
        field: String,
        violations: usize,
        worst_ratio: f64,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed field file.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl FvError {
    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(
        operation: impl Into<String>,
        lhs: DimensionSet,
        rhs: DimensionSet,
    ) -> Self {
        Self::DimensionMismatch {
            operation: operation.into(),
            lhs,
            rhs,
        }
    }

    /// Create an unknown-type error listing the valid alternatives.
    pub fn unknown_type<I, S>(kind: &'static str, name: impl Into<String>, valid: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut valid: Vec<String> = valid.into_iter().map(Into::into).collect();
        valid.sort();
        Self::UnknownType {
            kind,
            name: name.into(),
            valid,
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a parse error.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FvError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DIM_LENGTH, DIM_TIME};

    #[test]
    fn test_dimension_mismatch_message_prints_both_sets() {
        let err = FvError::dimension_mismatch("a + b", DIM_LENGTH, DIM_TIME);
        let msg = err.to_string();
        assert!(msg.contains("[0 1 0 0 0 0 0]"));
        assert!(msg.contains("[0 0 1 0 0 0 0]"));
        assert!(msg.contains("a + b"));
    }

    #[test]
    fn test_unknown_type_lists_sorted_alternatives() {
        let err = FvError::unknown_type("interpolation scheme", "cubic", ["upwind", "linear"]);
        assert_eq!(
            err.to_string(),
            "Unknown interpolation scheme type 'cubic'. Valid interpolation scheme types are: linear, upwind"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FvError = io.into();
        assert!(matches!(err, FvError::Io(_)));
    }
}
