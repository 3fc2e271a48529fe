//! Error taxonomy.
//!
//! `TransformError` covers structural failures raised while compiling a
//! transformation; `DesignError` covers everything that can go wrong while
//! loading and checking the design document.
use std::path::PathBuf;

use thiserror::Error;

use crate::expr::TypeId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The two sides cannot be reconciled, even after one unwrap attempt.
    #[error("cannot transform {source_path} ({source_kind}) into {target_path} ({target_kind}): incompatible types")]
    IncompatibleTypes {
        source_path: String,
        source_kind: String,
        target_path: String,
        target_kind: String,
    },

    #[error(
        "cannot transform union attribute {source_type} with {source_count} types to union attribute {target_type} with {target_count} types"
    )]
    UnionArityMismatch {
        source_type: String,
        source_count: usize,
        target_type: String,
        target_count: usize,
    },

    #[error("unknown type `{0}`")]
    UnknownType(TypeId),

    #[error("type `{type_name}` has no view named `{view}`")]
    UnknownView { type_name: String, view: String },

    /// Invariant violation: a bug in the generator rather than in the design.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TransformError {
    pub fn is_internal(&self) -> bool {
        matches!(self, TransformError::Internal(_))
    }
}

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid design at JSON path {path} → {message}")]
    Parse { path: String, message: String },

    #[error("jq preprocessing failed: {0}")]
    Jq(String),

    #[error("invalid input pattern: {0}")]
    Glob(String),

    /// A design that parses but violates a structural rule.
    #[error("{location}: {message}")]
    Check { location: String, message: String },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl DesignError {
    pub fn check(location: impl Into<String>, message: impl Into<String>) -> Self {
        DesignError::Check { location: location.into(), message: message.into() }
    }
}
